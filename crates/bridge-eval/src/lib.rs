//! # bridge-eval
//!
//! Translator from parsed Sigma rules to pipe-staged search queries.
//!
//! This crate consumes the AST produced by [`bridge_parser`] together with a
//! backend config and emits one query string per target index:
//!
//! - **Modifier chains** (`contains`, `endswith`, `startswith`, `re`, `cidr`,
//!   `gt`/`gte`/`lt`/`lte`, `base64`, `wide`, `all`) are validated and turned
//!   into quoted, escaped predicates.
//! - **Conditions** become `AND`/`OR`/`NOT` expressions with explicit
//!   parentheses; regex matches become trailing `| regex` stages, or a
//!   `| where` stage when they sit under `OR` or a negated group.
//! - **Aggregations** (`count`, `avg`, `sum`, `min`, `max`) become
//!   `| stats ... | sort ...` stages.
//! - **Targets** come from the config's log source mappings, falling back to
//!   its default index.
//!
//! Translation is pure: no I/O, and every failure aborts the rule with an
//! [`EvalError`].
//!
//! ## Quick Start
//!
//! ```rust
//! use bridge_parser::{parse_config, parse_rule};
//! use bridge_eval::RuleEvaluator;
//!
//! let rule = parse_rule(r#"
//! title: Detect Whoami
//! logsource:
//!     product: windows
//!     category: process_creation
//! detection:
//!     selection:
//!         CommandLine|contains: 'whoami'
//!     filter:
//!         User: SYSTEM
//!     condition: selection and not filter
//! "#).unwrap();
//!
//! let config = parse_config(r#"
//! logsources:
//!   process:
//!     category: process_creation
//!     index: sysmon
//! "#).unwrap();
//!
//! let queries = RuleEvaluator::for_rule(&rule)
//!     .with_config(&config)
//!     .bridges()
//!     .unwrap();
//! assert_eq!(
//!     queries.to_string(),
//!     r#"index="sysmon" AND commandline="*whoami*" AND NOT user="system""#
//! );
//! ```

pub mod aggregation;
pub mod condition;
pub mod error;
pub mod evaluator;
pub mod mapping;
pub mod modifiers;
pub mod query;
pub mod result;

// Re-export the most commonly used types and functions at crate root
pub use aggregation::lower_aggregation;
pub use condition::{Lowering, evaluate_condition};
pub use error::{EvalError, Result};
pub use evaluator::{RuleEvaluator, Target};
pub use mapping::FieldMappings;
pub use modifiers::{
    CaseMode, CompareOp, Comparator, Fragment, ModifierChain, ValueModifier, escape_backslashes,
    resolve_chain,
};
pub use query::Expr;
pub use result::QueryResult;

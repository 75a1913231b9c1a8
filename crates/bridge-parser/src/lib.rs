//! # bridge-parser
//!
//! Parser for Sigma detection rules and sigmac-style backend configs.
//!
//! This crate turns Sigma YAML into a strongly-typed AST, handling:
//!
//! - **Detection rules**: named selections, field modifiers, keyword lists
//! - **Condition expressions**: `and`, `or`, `not`, `1 of`, `all of`, parenthesized groups
//! - **Aggregation clauses**: `| count(field) by group > 10`, `avg`/`sum`/`min`/`max`, `near`
//! - **Rule collections**: multi-document YAML, `action: global/reset/repeat`
//! - **Backend configs**: field mappings, log source → index mappings, default index
//!
//! Modifier names are kept as written; deciding which chains are valid is
//! left to the translator.
//!
//! ## Quick Start
//!
//! ```rust
//! use bridge_parser::parse_rule;
//!
//! let yaml = r#"
//! title: Detect Whoami
//! logsource:
//!     product: windows
//!     category: process_creation
//! detection:
//!     selection:
//!         CommandLine|contains: 'whoami'
//!     condition: selection
//! level: medium
//! "#;
//!
//! let rule = parse_rule(yaml).unwrap();
//! assert_eq!(rule.title, "Detect Whoami");
//! ```
//!
//! ## Parsing condition expressions
//!
//! ```rust
//! use bridge_parser::parse_condition;
//!
//! let cond = parse_condition("selection and not 1 of filter_* | count() by host > 5").unwrap();
//! assert!(cond.aggregation.is_some());
//! println!("{}", cond.search);
//! ```

pub mod ast;
pub mod condition;
pub mod config;
pub mod error;
pub mod parser;
pub mod value;

// Re-export the most commonly used types and functions at crate root
pub use ast::{
    AggregationExpr, AggregationFunc, ComparisonOp, Condition, ConditionExpr, Detection,
    DetectionItem, Detections, FieldSpec, Level, LogSource, Quantifier, SelectorPattern,
    SigmaCollection, SigmaRule, Status,
};
pub use condition::parse_condition;
pub use config::{Config, LogSourceMapping, parse_config, parse_config_file};
pub use error::{Result, SigmaParserError};
pub use parser::{
    parse_field_spec, parse_rule, parse_sigma_directory, parse_sigma_file, parse_sigma_yaml,
};
pub use value::SigmaValue;

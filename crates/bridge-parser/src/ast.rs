//! AST types for Sigma detection rules: metadata, detections, conditions
//! and legacy aggregation clauses.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::value::SigmaValue;

// =============================================================================
// Enumerations
// =============================================================================

/// Rule maturity status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Stable,
    Test,
    Experimental,
    Deprecated,
    Unsupported,
}

impl FromStr for Status {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stable" => Ok(Status::Stable),
            "test" => Ok(Status::Test),
            "experimental" => Ok(Status::Experimental),
            "deprecated" => Ok(Status::Deprecated),
            "unsupported" => Ok(Status::Unsupported),
            _ => Err(()),
        }
    }
}

/// Severity level of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Informational,
    Low,
    Medium,
    High,
    Critical,
}

impl FromStr for Level {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "informational" => Ok(Level::Informational),
            "low" => Ok(Level::Low),
            "medium" => Ok(Level::Medium),
            "high" => Ok(Level::High),
            "critical" => Ok(Level::Critical),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Level::Informational => "informational",
            Level::Low => "low",
            Level::Medium => "medium",
            Level::High => "high",
            Level::Critical => "critical",
        };
        write!(f, "{s}")
    }
}

// =============================================================================
// Field Specification
// =============================================================================

/// A field name with optional modifiers, parsed from detection keys like
/// `TargetObject|endswith` or `CommandLine|base64|contains`.
///
/// Modifier names are kept as written. Whether a chain is valid depends on
/// the translation target, so validation happens when the chain is resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldSpec {
    /// Field name (`None` for keyword detections without a field).
    pub name: Option<String>,
    /// Ordered list of modifier names applied to this field.
    pub modifiers: Vec<String>,
}

impl FieldSpec {
    pub fn new(name: Option<String>, modifiers: Vec<String>) -> Self {
        FieldSpec { name, modifiers }
    }

    pub fn has_modifier(&self, m: &str) -> bool {
        self.modifiers.iter().any(|x| x == m)
    }

    pub fn is_keyword(&self) -> bool {
        self.name.is_none()
    }
}

// =============================================================================
// Condition Expression AST
// =============================================================================

/// Parsed condition expression AST.
///
/// Produced by the PEG parser + Pratt parser from condition strings like
/// `selection and not filter` or `1 of selection_* and not 1 of filter_*`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ConditionExpr {
    /// Logical AND of sub-expressions.
    And(Vec<ConditionExpr>),
    /// Logical OR of sub-expressions.
    Or(Vec<ConditionExpr>),
    /// Logical NOT of a sub-expression.
    Not(Box<ConditionExpr>),
    /// Reference to a named detection identifier.
    Identifier(String),
    /// Quantified selector: `1 of selection_*`, `all of them`, etc.
    Selector {
        quantifier: Quantifier,
        pattern: SelectorPattern,
    },
}

impl fmt::Display for ConditionExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionExpr::And(args) => {
                let parts: Vec<String> = args.iter().map(|a| format!("{a}")).collect();
                write!(f, "({})", parts.join(" and "))
            }
            ConditionExpr::Or(args) => {
                let parts: Vec<String> = args.iter().map(|a| format!("{a}")).collect();
                write!(f, "({})", parts.join(" or "))
            }
            ConditionExpr::Not(arg) => write!(f, "not {arg}"),
            ConditionExpr::Identifier(id) => write!(f, "{id}"),
            ConditionExpr::Selector {
                quantifier,
                pattern,
            } => write!(f, "{quantifier} of {pattern}"),
        }
    }
}

/// Quantifier in a selector expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Quantifier {
    /// Match any (at least one): `1 of ...` or `any of ...`
    Any,
    /// Match all: `all of ...`
    All,
    /// Match a specific count: `N of ...`
    Count(u64),
}

impl fmt::Display for Quantifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quantifier::Any => write!(f, "1"),
            Quantifier::All => write!(f, "all"),
            Quantifier::Count(n) => write!(f, "{n}"),
        }
    }
}

/// Target pattern in a selector expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SelectorPattern {
    /// All detection identifiers: `... of them`
    Them,
    /// A wildcard pattern matching detection names: `... of selection_*`
    Pattern(String),
}

impl fmt::Display for SelectorPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectorPattern::Them => write!(f, "them"),
            SelectorPattern::Pattern(p) => write!(f, "{p}"),
        }
    }
}

// =============================================================================
// Aggregation clause
// =============================================================================

/// Comparison operator of an aggregation threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ComparisonOp {
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = "==")]
    Eq,
}

impl FromStr for ComparisonOp {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            ">" => Ok(ComparisonOp::Gt),
            ">=" => Ok(ComparisonOp::Gte),
            "<" => Ok(ComparisonOp::Lt),
            "<=" => Ok(ComparisonOp::Lte),
            "=" | "==" => Ok(ComparisonOp::Eq),
            _ => Err(()),
        }
    }
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ComparisonOp::Gt => ">",
            ComparisonOp::Gte => ">=",
            ComparisonOp::Lt => "<",
            ComparisonOp::Lte => "<=",
            ComparisonOp::Eq => "==",
        };
        write!(f, "{s}")
    }
}

/// Aggregation function of a legacy `condition: ... | count(x) by y > n` clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "function", rename_all = "lowercase")]
pub enum AggregationFunc {
    Count {
        field: Option<String>,
        grouped_by: Option<String>,
    },
    #[serde(rename = "avg")]
    Average {
        field: Option<String>,
        grouped_by: Option<String>,
    },
    Sum {
        field: Option<String>,
        grouped_by: Option<String>,
    },
    Min {
        field: Option<String>,
        grouped_by: Option<String>,
    },
    Max {
        field: Option<String>,
        grouped_by: Option<String>,
    },
}

impl AggregationFunc {
    /// Build a function from its Sigma name (`count`, `avg`, `sum`, `min`, `max`).
    ///
    /// Returns `None` for names outside that set.
    pub fn from_name(
        name: &str,
        field: Option<String>,
        grouped_by: Option<String>,
    ) -> Option<Self> {
        let func = match name.to_ascii_lowercase().as_str() {
            "count" => AggregationFunc::Count { field, grouped_by },
            "avg" => AggregationFunc::Average { field, grouped_by },
            "sum" => AggregationFunc::Sum { field, grouped_by },
            "min" => AggregationFunc::Min { field, grouped_by },
            "max" => AggregationFunc::Max { field, grouped_by },
            _ => return None,
        };
        Some(func)
    }

    pub fn field(&self) -> Option<&str> {
        match self {
            AggregationFunc::Count { field, .. }
            | AggregationFunc::Average { field, .. }
            | AggregationFunc::Sum { field, .. }
            | AggregationFunc::Min { field, .. }
            | AggregationFunc::Max { field, .. } => field.as_deref(),
        }
    }

    pub fn grouped_by(&self) -> Option<&str> {
        match self {
            AggregationFunc::Count { grouped_by, .. }
            | AggregationFunc::Average { grouped_by, .. }
            | AggregationFunc::Sum { grouped_by, .. }
            | AggregationFunc::Min { grouped_by, .. }
            | AggregationFunc::Max { grouped_by, .. } => grouped_by.as_deref(),
        }
    }
}

/// The aggregation clause following the `|` in a condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum AggregationExpr {
    /// `near sel_a and not sel_b`: temporal proximity.
    Near(ConditionExpr),
    /// `count(field) by group > 10`
    Comparison {
        func: AggregationFunc,
        op: ComparisonOp,
        threshold: i64,
    },
}

/// A fully parsed `condition:` entry: the search expression plus the
/// optional aggregation clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Condition {
    pub search: ConditionExpr,
    pub aggregation: Option<AggregationExpr>,
}

// =============================================================================
// Detection Section
// =============================================================================

/// A single detection item: a field (with modifiers) mapped to one or more values.
///
/// Examples:
/// - `EventID: 4624` → field="EventID", values=[4624]
/// - `CommandLine|contains|all: ['new-object', 'net.webclient']` →
///   field="CommandLine", modifiers=["contains", "all"], values=[...]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionItem {
    /// The field specification (name + modifiers).
    pub field: FieldSpec,
    /// One or more values to match against.
    pub values: Vec<SigmaValue>,
}

/// A detection definition: a group of detection items or nested detections.
///
/// When constructed from a YAML mapping, items are AND-linked.
/// When constructed from a YAML list of mappings, sub-detections are OR-linked.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Detection {
    /// AND-linked detection items (from a YAML mapping).
    AllOf(Vec<DetectionItem>),
    /// OR-linked sub-detections (from a YAML list of mappings).
    AnyOf(Vec<Detection>),
    /// Keyword detection: plain value(s) without a field.
    Keywords(Vec<SigmaValue>),
}

/// The complete detection section of a Sigma rule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detections {
    /// Named detections (e.g. `selection`, `filter_main`, etc.)
    pub named: HashMap<String, Detection>,
    /// The search expression of the condition.
    pub condition: ConditionExpr,
    /// Optional aggregation clause (`| count() by x > 5`).
    pub aggregation: Option<AggregationExpr>,
    /// Raw condition string(s) (before parsing).
    pub condition_strings: Vec<String>,
    /// Optional timeframe for aggregation rules.
    pub timeframe: Option<String>,
}

// =============================================================================
// Log Source
// =============================================================================

/// Log source specification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LogSource {
    pub category: Option<String>,
    pub product: Option<String>,
    pub service: Option<String>,
    pub definition: Option<String>,
}

// =============================================================================
// Sigma Detection Rule
// =============================================================================

/// A complete Sigma detection rule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SigmaRule {
    // Required fields
    pub title: String,
    pub logsource: LogSource,
    pub detection: Detections,

    // Optional metadata
    pub id: Option<String>,
    pub status: Option<Status>,
    pub description: Option<String>,
    pub author: Option<String>,
    pub references: Vec<String>,
    pub date: Option<String>,
    pub modified: Option<String>,
    pub falsepositives: Vec<String>,
    pub level: Option<Level>,
    pub tags: Vec<String>,
}

// =============================================================================
// Collection
// =============================================================================

/// The rules parsed from one or more YAML documents.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SigmaCollection {
    pub rules: Vec<SigmaRule>,
    /// Per-document parsing errors; valid documents are still collected.
    #[serde(skip)]
    pub errors: Vec<String>,
}

impl SigmaCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

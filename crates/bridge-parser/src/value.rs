use std::fmt;

use serde::Serialize;

// =============================================================================
// SigmaValue: typed values in detection items
// =============================================================================

/// A typed value from a Sigma detection item.
///
/// Strings are kept verbatim: wildcards (`*`, `?`) and backslashes are
/// meaningful to the search backend, so the translator passes them through
/// and only applies the quoting rules of the target language.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SigmaValue {
    /// String value (may contain backend wildcards)
    String(String),
    /// Integer value
    Integer(i64),
    /// Floating point value
    Float(f64),
    /// Boolean value
    Bool(bool),
    /// Null / empty value
    Null,
}

impl SigmaValue {
    /// Create a SigmaValue from a serde_yaml::Value.
    pub fn from_yaml(v: &serde_yaml::Value) -> Self {
        match v {
            serde_yaml::Value::String(s) => SigmaValue::String(s.clone()),
            serde_yaml::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    SigmaValue::Integer(i)
                } else if let Some(f) = n.as_f64() {
                    SigmaValue::Float(f)
                } else {
                    SigmaValue::Null
                }
            }
            serde_yaml::Value::Bool(b) => SigmaValue::Bool(*b),
            serde_yaml::Value::Null => SigmaValue::Null,
            _ => SigmaValue::String(format!("{v:?}")),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SigmaValue::Null)
    }
}

impl From<&str> for SigmaValue {
    fn from(s: &str) -> Self {
        SigmaValue::String(s.to_string())
    }
}

impl From<i64> for SigmaValue {
    fn from(n: i64) -> Self {
        SigmaValue::Integer(n)
    }
}

impl fmt::Display for SigmaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SigmaValue::String(s) => write!(f, "{s}"),
            SigmaValue::Integer(n) => write!(f, "{n}"),
            SigmaValue::Float(n) => write!(f, "{n}"),
            SigmaValue::Bool(b) => write!(f, "{b}"),
            SigmaValue::Null => write!(f, "null"),
        }
    }
}

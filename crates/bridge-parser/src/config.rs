//! Backend configuration parsing (legacy sigmac config YAML).
//!
//! A config supplies three things to the translator: field-name mappings,
//! log source → index mappings, and a fallback index list.
//!
//! ```yaml
//! title: Splunk
//! order: 20
//! backends: [splunk]
//! defaultindex: main
//! fieldmappings:
//!   EventID: EventCode
//!   user: [Account_Name, UserID]
//! logsources:
//!   windows-security:
//!     product: windows
//!     service: security
//!     index: wineventlog
//!     conditions:
//!       EventLog: Security
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::Serialize;
use serde_yaml::Value;

use crate::ast::LogSource;
use crate::error::{Result, SigmaParserError};
use crate::parser::{get_str, get_str_or_str_list, val_key};
use crate::value::SigmaValue;

/// Parsed backend configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Config {
    pub title: Option<String>,
    pub order: Option<i64>,
    pub backends: Vec<String>,
    /// Sigma field name → target names; only the first target is used.
    pub field_mappings: HashMap<String, Vec<String>>,
    /// Log source mappings in config order.
    pub logsources: Vec<LogSourceMapping>,
    /// Indexes used when no log source mapping contributes one.
    pub default_index: Vec<String>,
}

/// One entry of the `logsources:` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LogSourceMapping {
    pub name: String,
    pub category: Option<String>,
    pub product: Option<String>,
    pub service: Option<String>,
    pub index: Vec<String>,
    /// Extra field constraints ANDed in front of the rule's filter.
    pub conditions: Vec<(String, SigmaValue)>,
}

impl LogSourceMapping {
    /// A mapping applies when every key it sets equals the rule's value.
    ///
    /// A mapping that sets none of `category`/`product`/`service` matches
    /// every rule.
    pub fn matches(&self, logsource: &LogSource) -> bool {
        fn key_matches(expected: &Option<String>, actual: &Option<String>) -> bool {
            match expected {
                Some(e) => actual.as_deref() == Some(e.as_str()),
                None => true,
            }
        }

        key_matches(&self.category, &logsource.category)
            && key_matches(&self.product, &logsource.product)
            && key_matches(&self.service, &logsource.service)
    }
}

impl Config {
    /// The first target name for a Sigma field, if the config maps it.
    pub fn mapped_field(&self, field: &str) -> Option<&str> {
        self.field_mappings
            .get(field)
            .and_then(|targets| targets.first())
            .map(String::as_str)
    }
}

// =============================================================================
// Parsing
// =============================================================================

/// Parse a backend config from a YAML string.
///
/// An empty document yields the empty config.
pub fn parse_config(yaml: &str) -> Result<Config> {
    let value: Value = serde_yaml::from_str(yaml)?;
    parse_config_value(&value)
}

/// Parse a backend config from a YAML file.
pub fn parse_config_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

fn parse_config_value(value: &Value) -> Result<Config> {
    if value.is_null() {
        return Ok(Config::default());
    }

    let m = value
        .as_mapping()
        .ok_or_else(|| SigmaParserError::InvalidConfig("config must be a mapping".into()))?;

    let field_mappings = match m.get(val_key("fieldmappings")) {
        None | Some(Value::Null) => HashMap::new(),
        Some(v) => parse_field_mappings(v)?,
    };

    let logsources = match m.get(val_key("logsources")) {
        None | Some(Value::Null) => Vec::new(),
        Some(v) => parse_logsource_mappings(v)?,
    };

    Ok(Config {
        title: get_str(m, "title").map(|s| s.to_string()),
        order: m.get(val_key("order")).and_then(|v| v.as_i64()),
        backends: get_str_or_str_list(m, "backends"),
        field_mappings,
        logsources,
        default_index: get_str_or_str_list(m, "defaultindex"),
    })
}

/// Parse `fieldmappings:`; each value is a target name or a list of them.
fn parse_field_mappings(value: &Value) -> Result<HashMap<String, Vec<String>>> {
    let m = value.as_mapping().ok_or_else(|| {
        SigmaParserError::InvalidConfig("fieldmappings must be a mapping".into())
    })?;

    let mut mappings = HashMap::new();
    for (k, v) in m {
        let Some(field) = k.as_str() else {
            continue;
        };
        let targets: Vec<String> = match v {
            Value::String(s) => vec![s.clone()],
            Value::Sequence(seq) => seq
                .iter()
                .filter_map(|item| item.as_str().map(String::from))
                .collect(),
            _ => {
                return Err(SigmaParserError::InvalidConfig(format!(
                    "fieldmapping '{field}' must be a string or a list of strings"
                )));
            }
        };
        if targets.is_empty() {
            return Err(SigmaParserError::InvalidConfig(format!(
                "fieldmapping '{field}' has no target"
            )));
        }
        mappings.insert(field.to_string(), targets);
    }
    Ok(mappings)
}

fn parse_logsource_mappings(value: &Value) -> Result<Vec<LogSourceMapping>> {
    let m = value.as_mapping().ok_or_else(|| {
        SigmaParserError::InvalidConfig("logsources must be a mapping".into())
    })?;

    m.iter()
        .map(|(k, v)| {
            let name = k.as_str().unwrap_or_default().to_string();
            parse_logsource_mapping(name, v)
        })
        .collect()
}

fn parse_logsource_mapping(name: String, value: &Value) -> Result<LogSourceMapping> {
    let m = value.as_mapping().ok_or_else(|| {
        SigmaParserError::InvalidConfig(format!("logsource '{name}' must be a mapping"))
    })?;

    let conditions = match m.get(val_key("conditions")) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Mapping(cm)) => cm
            .iter()
            .filter_map(|(field, v)| {
                field
                    .as_str()
                    .map(|f| (f.to_string(), SigmaValue::from_yaml(v)))
            })
            .collect(),
        Some(_) => {
            return Err(SigmaParserError::InvalidConfig(format!(
                "conditions of logsource '{name}' must be a mapping"
            )));
        }
    };

    Ok(LogSourceMapping {
        category: get_str(m, "category").map(|s| s.to_string()),
        product: get_str(m, "product").map(|s| s.to_string()),
        service: get_str(m, "service").map(|s| s.to_string()),
        index: get_str_or_str_list(m, "index"),
        conditions,
        name,
    })
}

//! Main YAML → AST parser for Sigma detection rules.
//!
//! Handles:
//! - Single-document YAML (one rule)
//! - Multi-document YAML (--- separator, action: global/reset/repeat)
//! - Detection section parsing (named detections, field modifiers, values)
//! - Condition strings with legacy aggregation clauses
//! - Directory-based rule collection loading

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use serde_yaml::Value;

use crate::ast::*;
use crate::condition::parse_condition;
use crate::error::{Result, SigmaParserError};
use crate::value::SigmaValue;

// =============================================================================
// Public API
// =============================================================================

/// Parse a YAML string containing one or more Sigma documents.
///
/// Handles multi-document YAML (separated by `---`) and collection actions
/// (`action: global`, `action: reset`, `action: repeat`). Documents that fail
/// to parse are recorded in [`SigmaCollection::errors`] and skipped.
pub fn parse_sigma_yaml(yaml: &str) -> Result<SigmaCollection> {
    let mut collection = SigmaCollection::new();
    let mut global: Option<Value> = None;
    let mut previous: Option<Value> = None;

    for doc in serde_yaml::Deserializer::from_str(yaml) {
        let value: Value = match Value::deserialize(doc) {
            Ok(v) => v,
            Err(e) => {
                collection.errors.push(format!("YAML parse error: {e}"));
                continue;
            }
        };

        let Some(mapping) = value.as_mapping() else {
            collection
                .errors
                .push("Document is not a YAML mapping".to_string());
            continue;
        };

        let action = mapping
            .get(val_key("action"))
            .map(|a| a.as_str().unwrap_or("").to_string());

        let merged = match action.as_deref() {
            Some("global") => {
                global = Some(without_action(value));
                continue;
            }
            Some("reset") => {
                global = None;
                continue;
            }
            Some("repeat") => {
                let Some(prev) = previous.clone() else {
                    collection
                        .errors
                        .push("'action: repeat' without a previous document".to_string());
                    continue;
                };
                deep_merge(prev, without_action(value))
            }
            Some(other) => {
                collection
                    .errors
                    .push(format!("Unknown collection action: {other}"));
                continue;
            }
            None => value,
        };

        // Merge with global template if present
        let merged = match global {
            Some(ref global_val) => deep_merge(global_val.clone(), merged),
            None => merged,
        };

        // Track previous document for `action: repeat`
        previous = Some(merged.clone());

        match parse_detection_rule(&merged) {
            Ok(rule) => collection.rules.push(rule),
            Err(e) => {
                log::warn!("skipping Sigma document: {e}");
                collection.errors.push(e.to_string());
            }
        }
    }

    Ok(collection)
}

/// Parse exactly one Sigma rule from a YAML string.
///
/// Fails if the text holds no valid rule; when several documents are
/// present, the first valid rule is returned.
pub fn parse_rule(yaml: &str) -> Result<SigmaRule> {
    let mut collection = parse_sigma_yaml(yaml)?;
    if collection.rules.is_empty() {
        let reason = collection
            .errors
            .pop()
            .unwrap_or_else(|| "no Sigma rule found".to_string());
        return Err(SigmaParserError::InvalidRule(reason));
    }
    Ok(collection.rules.swap_remove(0))
}

/// Parse a single Sigma YAML file from a path.
pub fn parse_sigma_file(path: &Path) -> Result<SigmaCollection> {
    let content = std::fs::read_to_string(path)?;
    parse_sigma_yaml(&content)
}

/// Parse all Sigma YAML files from a directory (recursively).
pub fn parse_sigma_directory(dir: &Path) -> Result<SigmaCollection> {
    let mut collection = SigmaCollection::new();

    fn walk(dir: &Path, collection: &mut SigmaCollection) -> Result<()> {
        let mut entries = std::fs::read_dir(dir)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<Vec<_>>>()?;
        entries.sort();

        for path in entries {
            if path.is_dir() {
                walk(&path, collection)?;
            } else if matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("yml" | "yaml")
            ) {
                match parse_sigma_file(&path) {
                    Ok(sub) => {
                        collection.rules.extend(sub.rules);
                        collection.errors.extend(sub.errors);
                    }
                    Err(e) => {
                        collection.errors.push(format!("{}: {e}", path.display()));
                    }
                }
            }
        }
        Ok(())
    }

    walk(dir, &mut collection)?;
    Ok(collection)
}

// =============================================================================
// Detection Rule Parsing
// =============================================================================

/// Parse a detection rule from a YAML value.
fn parse_detection_rule(value: &Value) -> Result<SigmaRule> {
    let m = value
        .as_mapping()
        .ok_or_else(|| SigmaParserError::InvalidRule("Expected a YAML mapping".into()))?;

    let title = get_str(m, "title")
        .ok_or_else(|| SigmaParserError::MissingField("title".into()))?
        .to_string();

    let detection_val = m
        .get(val_key("detection"))
        .ok_or_else(|| SigmaParserError::MissingField("detection".into()))?;
    let detection = parse_detections(detection_val)?;

    let logsource = m
        .get(val_key("logsource"))
        .map(parse_logsource)
        .transpose()?
        .unwrap_or_default();

    Ok(SigmaRule {
        title,
        logsource,
        detection,
        id: get_str(m, "id").map(|s| s.to_string()),
        status: get_str(m, "status").and_then(|s| s.parse().ok()),
        description: get_str(m, "description").map(|s| s.to_string()),
        author: get_str(m, "author").map(|s| s.to_string()),
        references: get_str_list(m, "references"),
        date: get_scalar(m, "date"),
        modified: get_scalar(m, "modified"),
        falsepositives: get_str_or_str_list(m, "falsepositives"),
        level: get_str(m, "level").and_then(|s| s.parse().ok()),
        tags: get_str_list(m, "tags"),
    })
}

// =============================================================================
// Detection Section Parsing
// =============================================================================

/// Parse the `detection:` section of a rule.
///
/// The detection section contains:
/// - `condition`: string or list of strings
/// - `timeframe`: optional duration string
/// - Everything else: named detection identifiers
fn parse_detections(value: &Value) -> Result<Detections> {
    let m = value.as_mapping().ok_or_else(|| {
        SigmaParserError::InvalidDetection("Detection section must be a mapping".into())
    })?;

    let condition_val = m
        .get(val_key("condition"))
        .ok_or_else(|| SigmaParserError::MissingField("condition".into()))?;

    let condition_strings = match condition_val {
        Value::String(s) => vec![s.clone()],
        Value::Sequence(seq) => seq
            .iter()
            .filter_map(|v| v.as_str().map(|s| s.to_string()))
            .collect(),
        _ => {
            return Err(SigmaParserError::InvalidDetection(
                "condition must be a string or list of strings".into(),
            ));
        }
    };

    let (condition, aggregation) = combine_conditions(&condition_strings)?;

    let timeframe = get_str(m, "timeframe").map(|s| s.to_string());

    // Parse all named detections (everything except condition and timeframe)
    let mut named = HashMap::new();
    for (key, val) in m {
        let key_str = key.as_str().unwrap_or("");
        if key_str == "condition" || key_str == "timeframe" {
            continue;
        }
        named.insert(key_str.to_string(), parse_detection(val)?);
    }

    Ok(Detections {
        named,
        condition,
        aggregation,
        condition_strings,
        timeframe,
    })
}

/// Fold a condition list into one search expression.
///
/// A list of conditions means "any of them"; an aggregation clause is only
/// meaningful when it is the sole condition.
fn combine_conditions(strings: &[String]) -> Result<(ConditionExpr, Option<AggregationExpr>)> {
    let mut parsed = strings
        .iter()
        .map(|s| parse_condition(s))
        .collect::<Result<Vec<_>>>()?;

    match parsed.len() {
        0 => Err(SigmaParserError::InvalidDetection(
            "condition list must not be empty".into(),
        )),
        1 => {
            let cond = parsed.remove(0);
            Ok((cond.search, cond.aggregation))
        }
        _ => {
            if parsed.iter().any(|c| c.aggregation.is_some()) {
                return Err(SigmaParserError::InvalidDetection(
                    "aggregation clauses cannot be combined with a condition list".into(),
                ));
            }
            let searches = parsed.into_iter().map(|c| c.search).collect();
            Ok((ConditionExpr::Or(searches), None))
        }
    }
}

/// Parse a single named detection definition.
///
/// A detection can be:
/// 1. A mapping (key-value pairs, AND-linked)
/// 2. A list of plain values (keyword detection)
/// 3. A list of mappings (OR-linked sub-detections)
fn parse_detection(value: &Value) -> Result<Detection> {
    match value {
        Value::Mapping(m) => {
            let items: Vec<DetectionItem> = m
                .iter()
                .map(|(k, v)| parse_detection_item(k.as_str().unwrap_or(""), v))
                .collect::<Result<Vec<_>>>()?;
            Ok(Detection::AllOf(items))
        }
        Value::Sequence(seq) => {
            let all_plain = seq.iter().all(|v| !v.is_mapping() && !v.is_sequence());
            if all_plain {
                let values = seq.iter().map(SigmaValue::from_yaml).collect();
                Ok(Detection::Keywords(values))
            } else {
                let subs: Vec<Detection> = seq
                    .iter()
                    .map(parse_detection)
                    .collect::<Result<Vec<_>>>()?;
                Ok(Detection::AnyOf(subs))
            }
        }
        // Plain value → single keyword
        _ => Ok(Detection::Keywords(vec![SigmaValue::from_yaml(value)])),
    }
}

/// Parse a single detection item from a key-value pair.
fn parse_detection_item(key: &str, value: &Value) -> Result<DetectionItem> {
    let field = parse_field_spec(key);

    let values = match value {
        Value::Sequence(seq) => seq.iter().map(SigmaValue::from_yaml).collect(),
        _ => vec![SigmaValue::from_yaml(value)],
    };

    if values.is_empty() {
        return Err(SigmaParserError::InvalidDetection(format!(
            "detection item '{key}' has no values"
        )));
    }

    Ok(DetectionItem { field, values })
}

/// Parse a field specification string like `"TargetObject|endswith"`.
///
/// Splits on `|`: the first part is the field name, the rest are modifier
/// names in order. An empty field name yields a keyword spec.
pub fn parse_field_spec(key: &str) -> FieldSpec {
    let mut parts = key.split('|');
    let field = parts
        .next()
        .filter(|name| !name.is_empty())
        .map(|name| name.to_string());
    let modifiers = parts.map(|m| m.to_string()).collect();
    FieldSpec::new(field, modifiers)
}

// =============================================================================
// Log Source Parsing
// =============================================================================

fn parse_logsource(value: &Value) -> Result<LogSource> {
    let m = value
        .as_mapping()
        .ok_or_else(|| SigmaParserError::InvalidRule("logsource must be a mapping".into()))?;

    Ok(LogSource {
        category: get_str(m, "category").map(|s| s.to_string()),
        product: get_str(m, "product").map(|s| s.to_string()),
        service: get_str(m, "service").map(|s| s.to_string()),
        definition: get_str(m, "definition").map(|s| s.to_string()),
    })
}

// =============================================================================
// YAML Helpers
// =============================================================================

pub(crate) fn val_key(s: &str) -> Value {
    Value::String(s.to_string())
}

pub(crate) fn get_str<'a>(m: &'a serde_yaml::Mapping, key: &str) -> Option<&'a str> {
    m.get(val_key(key)).and_then(|v| v.as_str())
}

/// Like [`get_str`], but also renders numbers and booleans (unquoted dates
/// such as `2023/01/01` stay strings, `20230101` does not).
fn get_scalar(m: &serde_yaml::Mapping, key: &str) -> Option<String> {
    match m.get(val_key(key))? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn get_str_list(m: &serde_yaml::Mapping, key: &str) -> Vec<String> {
    match m.get(val_key(key)) {
        Some(Value::Sequence(seq)) => seq
            .iter()
            .filter_map(|v| v.as_str().map(|s| s.to_string()))
            .collect(),
        _ => Vec::new(),
    }
}

pub(crate) fn get_str_or_str_list(m: &serde_yaml::Mapping, key: &str) -> Vec<String> {
    match m.get(val_key(key)) {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Sequence(seq)) => seq
            .iter()
            .filter_map(|v| v.as_str().map(|s| s.to_string()))
            .collect(),
        _ => Vec::new(),
    }
}

fn without_action(mut value: Value) -> Value {
    if let Some(m) = value.as_mapping_mut() {
        m.remove(val_key("action"));
    }
    value
}

/// Deep-merge two YAML values (src overrides dest, recursively for mappings).
fn deep_merge(dest: Value, src: Value) -> Value {
    match (dest, src) {
        (Value::Mapping(mut dest_map), Value::Mapping(src_map)) => {
            for (k, v) in src_map {
                let merged = if let Some(existing) = dest_map.remove(&k) {
                    deep_merge(existing, v)
                } else {
                    v
                };
                dest_map.insert(k, merged);
            }
            Value::Mapping(dest_map)
        }
        (_, src) => src, // non-mapping: source wins
    }
}

// =============================================================================
// Tests
// =============================================================================

#![allow(dead_code)]

use bridge_eval::{CaseMode, QueryResult, Result, RuleEvaluator};
use bridge_parser::{Config, parse_config, parse_rule};

pub fn config_from_yaml(yaml: &str) -> Config {
    parse_config(yaml).unwrap()
}

/// Translate a rule with an optional config, case-insensitively.
pub fn translate(rule_yaml: &str, config_yaml: Option<&str>) -> Result<QueryResult> {
    translate_with_mode(rule_yaml, config_yaml, CaseMode::Insensitive)
}

pub fn translate_with_mode(
    rule_yaml: &str,
    config_yaml: Option<&str>,
    case_mode: CaseMode,
) -> Result<QueryResult> {
    let rule = parse_rule(rule_yaml).unwrap();
    let config = config_yaml.map(config_from_yaml).unwrap_or_default();
    RuleEvaluator::new(&rule, &config, case_mode).bridges()
}

/// Translate and return the single produced query.
pub fn single_query(rule_yaml: &str, config_yaml: Option<&str>) -> String {
    let result = translate(rule_yaml, config_yaml).unwrap();
    assert_eq!(result.len(), 1, "expected exactly one query, got: {result}");
    result.to_string()
}

/// Wrap a detection block into a minimal rule.
pub fn rule_with_detection(detection: &str) -> String {
    format!(
        "title: Test Rule\nlogsource:\n    product: windows\n    service: security\ndetection:\n{detection}"
    )
}

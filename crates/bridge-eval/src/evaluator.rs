//! Rule evaluator: one parsed rule + one backend config → queries.
//!
//! The evaluator resolves the rule's targets from the config's log source
//! mappings, lowers the condition tree and the aggregation clause once, and
//! assembles one query per target:
//!
//! ```text
//! index="<name>" AND <mapping conditions> AND <filter> <regex stages> <aggregation>
//! ```

use std::borrow::Cow;

use bridge_parser::{Config, SigmaRule, SigmaValue};

use crate::aggregation::lower_aggregation;
use crate::condition::{Lowering, evaluate_condition};
use crate::error::Result;
use crate::mapping::FieldMappings;
use crate::modifiers::{CaseMode, resolve_chain};
use crate::query::{Expr, join_query};
use crate::result::QueryResult;

/// A place the rule's query runs against.
#[derive(Debug, Clone, PartialEq)]
pub struct Target<'a> {
    /// Index name; `None` searches without an index constraint.
    pub index: Option<&'a str>,
    /// Extra field constraints from the matching log source mappings.
    pub conditions: Vec<&'a (String, SigmaValue)>,
}

/// Translates one Sigma rule with one backend config.
///
/// All inputs are bound at construction; [`RuleEvaluator::bridges`] can be
/// called any number of times.
///
/// # Example
///
/// ```rust
/// use bridge_parser::parse_rule;
/// use bridge_eval::RuleEvaluator;
///
/// let rule = parse_rule(r#"
/// title: Successful Logon
/// logsource:
///     product: windows
/// detection:
///     selection:
///         EventID: 4624
///     condition: selection
/// "#).unwrap();
///
/// let queries = RuleEvaluator::for_rule(&rule).bridges().unwrap();
/// assert_eq!(queries.to_string(), r#"eventid="4624""#);
/// ```
#[derive(Debug, Clone)]
pub struct RuleEvaluator<'a> {
    rule: &'a SigmaRule,
    config: Cow<'a, Config>,
    mappings: FieldMappings,
    case_mode: CaseMode,
}

impl<'a> RuleEvaluator<'a> {
    pub fn new(rule: &'a SigmaRule, config: &'a Config, case_mode: CaseMode) -> Self {
        RuleEvaluator {
            rule,
            mappings: FieldMappings::from_config(config),
            config: Cow::Borrowed(config),
            case_mode,
        }
    }

    /// Start from a rule with an empty config and case-insensitive matching.
    pub fn for_rule(rule: &'a SigmaRule) -> Self {
        RuleEvaluator {
            rule,
            config: Cow::Owned(Config::default()),
            mappings: FieldMappings::default(),
            case_mode: CaseMode::default(),
        }
    }

    pub fn with_config(mut self, config: &'a Config) -> Self {
        self.mappings = FieldMappings::from_config(config);
        self.config = Cow::Borrowed(config);
        self
    }

    pub fn with_case_mode(mut self, case_mode: CaseMode) -> Self {
        self.case_mode = case_mode;
        self
    }

    pub fn case_sensitive(self) -> Self {
        self.with_case_mode(CaseMode::Sensitive)
    }

    pub fn case_mode(&self) -> CaseMode {
        self.case_mode
    }

    pub fn mappings(&self) -> &FieldMappings {
        &self.mappings
    }

    /// Resolve the targets for this rule.
    ///
    /// Every log source mapping whose set keys all equal the rule's log
    /// source contributes its indexes, in config order. Without any such
    /// index the config's default indexes are used, and without those a
    /// single target with no index. Conditions of matching mappings that
    /// contribute no index apply to the fallback targets.
    pub fn targets(&self) -> Vec<Target<'_>> {
        let matching: Vec<_> = self
            .config
            .logsources
            .iter()
            .filter(|m| m.matches(&self.rule.logsource))
            .collect();

        let targets: Vec<Target<'_>> = matching
            .iter()
            .copied()
            .flat_map(|m| {
                m.index.iter().map(move |index| Target {
                    index: Some(index.as_str()),
                    conditions: m.conditions.iter().collect(),
                })
            })
            .collect();
        if !targets.is_empty() {
            return targets;
        }

        let conditions: Vec<_> = matching
            .iter()
            .copied()
            .flat_map(|m| m.conditions.iter())
            .collect();
        if self.config.default_index.is_empty() {
            return vec![Target {
                index: None,
                conditions,
            }];
        }
        self.config
            .default_index
            .iter()
            .map(|index| Target {
                index: Some(index.as_str()),
                conditions: conditions.clone(),
            })
            .collect()
    }

    /// Translate the rule into one query per target.
    pub fn bridges(&self) -> Result<QueryResult> {
        let lowering = Lowering {
            mappings: &self.mappings,
            case_mode: self.case_mode,
        };
        let detection = &self.rule.detection;
        let filter = evaluate_condition(&detection.condition, &detection.named, &lowering)?;
        let aggregation = detection
            .aggregation
            .as_ref()
            .map(|agg| lower_aggregation(agg, &self.mappings))
            .transpose()?;

        let targets = self.targets();
        log::debug!(
            "rule '{}': {} target(s), case mode {:?}",
            self.rule.title,
            targets.len(),
            self.case_mode
        );

        let mut result = QueryResult::new();
        for target in &targets {
            let query = self.assemble(target, &filter, aggregation.as_deref())?;
            log::debug!("rule '{}': {query}", self.rule.title);
            result.push(query);
        }
        Ok(result)
    }

    fn assemble(
        &self,
        target: &Target<'_>,
        filter: &Expr,
        aggregation: Option<&str>,
    ) -> Result<String> {
        let mut parts = Vec::with_capacity(target.conditions.len() + 2);
        if let Some(index) = target.index {
            parts.push(Expr::Term(format!("index=\"{index}\"")));
        }
        for (field, value) in &target.conditions {
            parts.push(self.condition_term(field, value)?);
        }
        parts.push(filter.clone());

        let (search, stages) = Expr::and(parts).hoist_stages();
        let search = search.to_string();
        Ok(join_query(
            std::iter::once(search.as_str())
                .chain(stages.iter().map(String::as_str))
                .chain(aggregation),
        ))
    }

    fn condition_term(&self, field: &str, value: &SigmaValue) -> Result<Expr> {
        let chain = resolve_chain::<&str>(&[], self.case_mode)?;
        let fragment = chain.bridge(Some(self.mappings.resolve(field)), &value.to_string())?;
        Ok(fragment.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_parser::{parse_config, parse_rule};
    use insta::assert_snapshot;

    const LOGON_RULE: &str = r#"
title: Successful Logon
logsource:
    product: windows
    service: security
detection:
    selection:
        EventID: 4624
    condition: selection
"#;

    #[test]
    fn test_minimal_rule_without_config() {
        let rule = parse_rule(LOGON_RULE).unwrap();
        let result = RuleEvaluator::for_rule(&rule).bridges().unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result.get(0), Some(r#"eventid="4624""#));
    }

    #[test]
    fn test_repeatable() {
        let rule = parse_rule(LOGON_RULE).unwrap();
        let config = Config::default();
        let evaluator = RuleEvaluator::new(&rule, &config, CaseMode::Insensitive);
        assert_eq!(evaluator.bridges().unwrap(), evaluator.bridges().unwrap());
    }

    #[test]
    fn test_logsource_index_and_conditions() {
        let rule = parse_rule(LOGON_RULE).unwrap();
        let config = parse_config(
            r#"
fieldmappings:
  EventID: EventCode
logsources:
  windows-security:
    product: windows
    service: security
    index: wineventlog
    conditions:
      EventLog: Security
  linux:
    product: linux
    index: unix
"#,
        )
        .unwrap();
        let evaluator = RuleEvaluator::for_rule(&rule).with_config(&config);
        assert_eq!(evaluator.targets().len(), 1);
        assert_snapshot!(
            evaluator.bridges().unwrap().to_string(),
            @r#"index="wineventlog" AND eventlog="security" AND eventcode="4624""#
        );
    }

    #[test]
    fn test_default_index_fallback() {
        let rule = parse_rule(LOGON_RULE).unwrap();
        let config = parse_config("defaultindex: [main, archive]\n").unwrap();
        let result = RuleEvaluator::for_rule(&rule)
            .with_config(&config)
            .bridges()
            .unwrap();
        assert_eq!(
            result.queries().collect::<Vec<_>>(),
            vec![
                r#"index="main" AND eventid="4624""#,
                r#"index="archive" AND eventid="4624""#,
            ]
        );
    }

    #[test]
    fn test_case_sensitive_builder() {
        let rule = parse_rule(
            r#"
title: Whoami
detection:
    selection:
        CommandLine|contains: WhoAmI
    condition: selection
"#,
        )
        .unwrap();
        let insensitive = RuleEvaluator::for_rule(&rule).bridges().unwrap();
        assert_eq!(insensitive.to_string(), r#"commandline="*whoami*""#);

        let sensitive = RuleEvaluator::for_rule(&rule).case_sensitive();
        assert_eq!(sensitive.case_mode(), CaseMode::Sensitive);
        assert_eq!(
            sensitive.bridges().unwrap().to_string(),
            r#"commandline="*WhoAmI*""#
        );
    }

    #[test]
    fn test_regex_and_aggregation_assembly() {
        let rule = parse_rule(
            r#"
title: Failed Logons From Script Hosts
logsource:
    product: windows
detection:
    selection:
        EventID: 4625
        ProcessName|re: '.*\\(wscript|cscript)\.exe'
    condition: selection | count(TargetUserName) by IpAddress > 10
"#,
        )
        .unwrap();
        let config = parse_config("fieldmappings:\n  TargetUserName: [Account_Name, UserID]\n").unwrap();
        let result = RuleEvaluator::for_rule(&rule)
            .with_config(&config)
            .bridges()
            .unwrap();
        assert_snapshot!(
            result.to_string(),
            @r#"eventid="4625" | regex processname=".*\\\\(wscript|cscript)\\.exe" | stats count by Account_Name,IpAddress | sort -count > 10"#
        );
    }

    #[test]
    fn test_no_matching_logsource_without_default() {
        let rule = parse_rule(LOGON_RULE).unwrap();
        let config = parse_config("logsources:\n  lin:\n    product: linux\n    index: unix\n").unwrap();
        let evaluator = RuleEvaluator::for_rule(&rule).with_config(&config);
        assert_eq!(
            evaluator.targets(),
            vec![Target {
                index: None,
                conditions: Vec::new(),
            }]
        );
    }
}

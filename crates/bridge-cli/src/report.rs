//! Rendering translated rules as plain text or JSON reports.

use bridge_eval::QueryResult;
use bridge_parser::SigmaRule;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

const SIGMA_REPOSITORY: &str = "Sigma Repository: [GitHub](https://github.com/SigmaHQ/sigma)";

/// JSON document describing one translated rule.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Report<'a> {
    pub name: &'a str,
    pub description: String,
    pub query: String,
    pub insert_date: String,
    pub last_update_date: String,
    pub tags: &'a [String],
    pub level: String,
}

impl<'a> Report<'a> {
    pub fn new(rule: &'a SigmaRule, queries: &QueryResult, now: DateTime<Utc>) -> Self {
        let timestamp = now.to_rfc3339_opts(SecondsFormat::Secs, true);
        Report {
            name: &rule.title,
            description: format!(
                "{}\n\nAuthor: {}\n{SIGMA_REPOSITORY}",
                rule.description.as_deref().unwrap_or_default(),
                rule.author.as_deref().unwrap_or_default(),
            ),
            query: queries.to_string(),
            insert_date: timestamp.clone(),
            last_update_date: timestamp,
            tags: &rule.tags,
            level: rule.level.map(|l| l.to_string()).unwrap_or_default(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// One query per line, each newline-terminated.
pub fn render_plain(queries: &QueryResult) -> String {
    queries.queries().map(|q| format!("{q}\n")).collect()
}

/// File name for `--output`, with path separators replaced.
pub fn output_file_name(title: &str) -> String {
    let stem: String = title
        .chars()
        .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
        .collect();
    format!("{stem}.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_eval::RuleEvaluator;
    use bridge_parser::parse_rule;
    use chrono::TimeZone;
    use insta::assert_snapshot;

    const RULE: &str = r#"
title: Whoami Execution
description: Detects whoami
author: Jane Doe
tags:
    - attack.discovery
    - attack.t1033
level: high
logsource:
    category: process_creation
detection:
    selection:
        CommandLine|contains: whoami
    condition: selection
"#;

    #[test]
    fn json_report_layout() {
        let rule = parse_rule(RULE).unwrap();
        let queries = RuleEvaluator::for_rule(&rule).bridges().unwrap();
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();

        let json = Report::new(&rule, &queries, now).to_json().unwrap();
        assert_snapshot!(json, @r#"
        {
          "Name": "Whoami Execution",
          "Description": "Detects whoami\n\nAuthor: Jane Doe\nSigma Repository: [GitHub](https://github.com/SigmaHQ/sigma)",
          "Query": "commandline=\"*whoami*\"",
          "InsertDate": "2024-03-01T12:30:00Z",
          "LastUpdateDate": "2024-03-01T12:30:00Z",
          "Tags": [
            "attack.discovery",
            "attack.t1033"
          ],
          "Level": "high"
        }
        "#);
    }

    #[test]
    fn missing_metadata_renders_empty() {
        let rule = parse_rule(
            "title: Bare\nlogsource:\n    product: x\ndetection:\n    sel:\n        A: 1\n    condition: sel\n",
        )
        .unwrap();
        let queries = RuleEvaluator::for_rule(&rule).bridges().unwrap();
        let report = Report::new(&rule, &queries, Utc::now());
        assert_eq!(report.level, "");
        assert!(report.tags.is_empty());
        assert!(report.description.starts_with("\n\nAuthor: \n"));
    }

    #[test]
    fn plain_output_is_newline_terminated() {
        let mut queries = QueryResult::new();
        queries.push("index=\"a\" AND x=\"1\"".to_string());
        queries.push("index=\"b\" AND x=\"1\"".to_string());
        assert_eq!(
            render_plain(&queries),
            "index=\"a\" AND x=\"1\"\nindex=\"b\" AND x=\"1\"\n"
        );
    }

    #[test]
    fn output_file_name_replaces_separators() {
        assert_eq!(output_file_name("Foo/Bar\\Baz"), "Foo_Bar_Baz.json");
        assert_eq!(output_file_name("Plain"), "Plain.json");
    }
}

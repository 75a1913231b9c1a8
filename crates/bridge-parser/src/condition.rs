//! Condition expression parser using pest PEG grammar + Pratt parser.
//!
//! Parses Sigma condition strings like:
//! - `"selection and not filter"`
//! - `"1 of selection_* and not 1 of filter_*"`
//! - `"all of them"`
//! - `"selection | count(TargetUserName) by SourceIP > 10"`

use pest::Parser;
use pest::iterators::Pair;
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest_derive::Parser;

use crate::ast::{
    AggregationExpr, AggregationFunc, ComparisonOp, Condition, ConditionExpr, Quantifier,
    SelectorPattern,
};
use crate::error::{Result, SigmaParserError};

// ---------------------------------------------------------------------------
// Pest parser (generated from sigma.pest grammar)
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[grammar = "src/sigma.pest"]
struct SigmaConditionParser;

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Parse a Sigma condition string into its search expression and optional
/// aggregation clause.
///
/// # Examples
///
/// ```
/// use bridge_parser::condition::parse_condition;
///
/// let cond = parse_condition("selection | count() by SourceIP > 10").unwrap();
/// assert!(cond.aggregation.is_some());
/// println!("{}", cond.search);
/// ```
pub fn parse_condition(input: &str) -> Result<Condition> {
    let pairs = SigmaConditionParser::parse(Rule::condition, input)
        .map_err(|e| SigmaParserError::Condition(e.to_string()))?;

    let pratt = pratt_parser();

    // condition = { SOI ~ expr ~ ("|" ~ aggregation)? ~ EOI }
    let condition_pair = pairs
        .into_iter()
        .next()
        .ok_or_else(|| SigmaParserError::Condition(format!("empty condition: {input}")))?;

    let mut search = None;
    let mut aggregation = None;
    for pair in condition_pair.into_inner() {
        match pair.as_rule() {
            Rule::expr => search = Some(parse_expr(pair, &pratt)),
            Rule::near_agg => aggregation = Some(parse_near(pair, &pratt)),
            Rule::comparison_agg => aggregation = Some(parse_comparison(pair)?),
            _ => {} // EOI
        }
    }

    let search = search
        .ok_or_else(|| SigmaParserError::Condition(format!("missing search expression: {input}")))?;

    Ok(Condition {
        search,
        aggregation,
    })
}

// ---------------------------------------------------------------------------
// Internal parsing helpers
// ---------------------------------------------------------------------------

fn pratt_parser() -> PrattParser<Rule> {
    PrattParser::new()
        .op(Op::infix(Rule::or_op, Assoc::Left))
        .op(Op::infix(Rule::and_op, Assoc::Left))
        .op(Op::prefix(Rule::not_op))
}

fn parse_expr(pair: Pair<'_, Rule>, pratt: &PrattParser<Rule>) -> ConditionExpr {
    pratt
        .map_primary(|primary| match primary.as_rule() {
            Rule::ident => ConditionExpr::Identifier(primary.as_str().to_string()),
            Rule::selector => parse_selector(primary),
            Rule::expr => parse_expr(primary, pratt),
            other => unreachable!("unexpected primary rule: {other:?}"),
        })
        .map_prefix(|op, rhs| match op.as_rule() {
            Rule::not_op => ConditionExpr::Not(Box::new(rhs)),
            other => unreachable!("unexpected prefix rule: {other:?}"),
        })
        .map_infix(|lhs, op, rhs| match op.as_rule() {
            Rule::and_op => merge_binary(true, lhs, rhs),
            Rule::or_op => merge_binary(false, lhs, rhs),
            other => unreachable!("unexpected infix rule: {other:?}"),
        })
        .parse(pair.into_inner())
}

/// Flatten nested binary operators of the same kind.
/// `a AND (b AND c)` → `AND(a, b, c)` instead of `AND(a, AND(b, c))`.
fn merge_binary(is_and: bool, lhs: ConditionExpr, rhs: ConditionExpr) -> ConditionExpr {
    let mut args = Vec::new();
    for side in [lhs, rhs] {
        match side {
            ConditionExpr::And(children) if is_and => args.extend(children),
            ConditionExpr::Or(children) if !is_and => args.extend(children),
            other => args.push(other),
        }
    }

    if is_and {
        ConditionExpr::And(args)
    } else {
        ConditionExpr::Or(args)
    }
}

fn parse_selector(pair: Pair<'_, Rule>) -> ConditionExpr {
    // of_kw_inner is atomic and therefore not silent; skip it
    let mut quantifier = Quantifier::Any;
    let mut pattern = SelectorPattern::Them;

    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::quantifier => quantifier = parse_quantifier(p),
            Rule::selector_target => pattern = parse_selector_target(p),
            _ => {}
        }
    }

    ConditionExpr::Selector {
        quantifier,
        pattern,
    }
}

fn parse_quantifier(pair: Pair<'_, Rule>) -> Quantifier {
    let Some(inner) = pair.into_inner().next() else {
        return Quantifier::Any;
    };
    match inner.as_rule() {
        Rule::all_kw => Quantifier::All,
        Rule::any_kw => Quantifier::Any,
        Rule::uint => match inner.as_str().parse::<u64>() {
            Ok(1) => Quantifier::Any,
            Ok(n) => Quantifier::Count(n),
            // digits only, so the sole failure is overflow
            Err(_) => Quantifier::Count(u64::MAX),
        },
        other => unreachable!("unexpected quantifier rule: {other:?}"),
    }
}

fn parse_selector_target(pair: Pair<'_, Rule>) -> SelectorPattern {
    match pair.into_inner().next() {
        Some(inner) if inner.as_rule() == Rule::ident_pattern => {
            SelectorPattern::Pattern(inner.as_str().to_string())
        }
        _ => SelectorPattern::Them,
    }
}

fn parse_near(pair: Pair<'_, Rule>, pratt: &PrattParser<Rule>) -> AggregationExpr {
    let expr = pair
        .into_inner()
        .find(|p| p.as_rule() == Rule::expr)
        .map(|p| parse_expr(p, pratt))
        .unwrap_or_else(|| ConditionExpr::And(Vec::new()));
    AggregationExpr::Near(expr)
}

fn parse_comparison(pair: Pair<'_, Rule>) -> Result<AggregationExpr> {
    let mut name = "";
    let mut field = None;
    let mut grouped_by = None;
    let mut op = None;
    let mut threshold = 0i64;

    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::agg_func => name = p.as_str(),
            Rule::agg_field => field = Some(p.as_str().to_string()),
            Rule::group_field => grouped_by = Some(p.as_str().to_string()),
            Rule::comp_op => op = p.as_str().parse::<ComparisonOp>().ok(),
            Rule::threshold => {
                // fractional thresholds are truncated toward zero
                threshold = p
                    .as_str()
                    .parse::<f64>()
                    .map(|t| t as i64)
                    .map_err(|e| SigmaParserError::Condition(format!("invalid threshold: {e}")))?;
            }
            _ => {} // by_kw
        }
    }

    let func = AggregationFunc::from_name(name, field, grouped_by)
        .ok_or_else(|| SigmaParserError::UnsupportedAggregationFunction(name.to_string()))?;
    let op = op.ok_or_else(|| {
        SigmaParserError::Condition("aggregation is missing a comparison operator".into())
    })?;

    Ok(AggregationExpr::Comparison {
        func,
        op,
        threshold,
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn search(input: &str) -> ConditionExpr {
        let cond = parse_condition(input).unwrap();
        assert!(cond.aggregation.is_none());
        cond.search
    }

    fn ident(name: &str) -> ConditionExpr {
        ConditionExpr::Identifier(name.to_string())
    }

    #[test]
    fn test_simple_identifier() {
        assert_eq!(search("selection"), ident("selection"));
    }

    #[test]
    fn test_and_not() {
        assert_eq!(
            search("selection and not filter"),
            ConditionExpr::And(vec![
                ident("selection"),
                ConditionExpr::Not(Box::new(ident("filter"))),
            ])
        );
    }

    #[test]
    fn test_precedence_not_and_or() {
        // "a or not b and c" should parse as "a or ((not b) and c)"
        assert_eq!(
            search("a or not b and c"),
            ConditionExpr::Or(vec![
                ident("a"),
                ConditionExpr::And(vec![ConditionExpr::Not(Box::new(ident("b"))), ident("c")]),
            ])
        );
    }

    #[test]
    fn test_parentheses() {
        assert_eq!(
            search("(a or b) and c"),
            ConditionExpr::And(vec![
                ConditionExpr::Or(vec![ident("a"), ident("b")]),
                ident("c"),
            ])
        );
    }

    #[test]
    fn test_uppercase_operators() {
        assert_eq!(
            search("a AND NOT b"),
            ConditionExpr::And(vec![ident("a"), ConditionExpr::Not(Box::new(ident("b")))])
        );
    }

    #[test]
    fn test_triple_or_flattened() {
        assert_eq!(
            search("a or b or c"),
            ConditionExpr::Or(vec![ident("a"), ident("b"), ident("c")])
        );
    }

    #[test]
    fn test_identifier_with_keyword_substring() {
        assert_eq!(search("selection_and_filter"), ident("selection_and_filter"));
    }

    #[test]
    fn test_selectors() {
        assert_eq!(
            search("1 of selection_*"),
            ConditionExpr::Selector {
                quantifier: Quantifier::Any,
                pattern: SelectorPattern::Pattern("selection_*".to_string()),
            }
        );
        assert_eq!(
            search("all of them"),
            ConditionExpr::Selector {
                quantifier: Quantifier::All,
                pattern: SelectorPattern::Them,
            }
        );
        assert_eq!(
            search("3 of sel*"),
            ConditionExpr::Selector {
                quantifier: Quantifier::Count(3),
                pattern: SelectorPattern::Pattern("sel*".to_string()),
            }
        );
    }

    #[test]
    fn test_complex_condition() {
        assert_eq!(
            search("selection_main and 1 of selection_dword_* and not 1 of filter_optional_*"),
            ConditionExpr::And(vec![
                ident("selection_main"),
                ConditionExpr::Selector {
                    quantifier: Quantifier::Any,
                    pattern: SelectorPattern::Pattern("selection_dword_*".to_string()),
                },
                ConditionExpr::Not(Box::new(ConditionExpr::Selector {
                    quantifier: Quantifier::Any,
                    pattern: SelectorPattern::Pattern("filter_optional_*".to_string()),
                })),
            ])
        );
    }

    #[test]
    fn test_count_aggregation() {
        let cond = parse_condition("selection | count() by SourceIP > 10").unwrap();
        assert_eq!(cond.search, ident("selection"));
        assert_eq!(
            cond.aggregation,
            Some(AggregationExpr::Comparison {
                func: AggregationFunc::Count {
                    field: None,
                    grouped_by: Some("SourceIP".to_string()),
                },
                op: ComparisonOp::Gt,
                threshold: 10,
            })
        );
    }

    #[test]
    fn test_field_aggregation() {
        let cond = parse_condition("sel | avg(Bytes) >= 1000").unwrap();
        assert_eq!(
            cond.aggregation,
            Some(AggregationExpr::Comparison {
                func: AggregationFunc::Average {
                    field: Some("Bytes".to_string()),
                    grouped_by: None,
                },
                op: ComparisonOp::Gte,
                threshold: 1000,
            })
        );
    }

    #[test]
    fn test_single_equals_is_eq() {
        let cond = parse_condition("sel | count(User) = 1").unwrap();
        assert!(matches!(
            cond.aggregation,
            Some(AggregationExpr::Comparison {
                op: ComparisonOp::Eq,
                ..
            })
        ));
    }

    #[test]
    fn test_near_aggregation() {
        let cond = parse_condition("sel | near other and not noise").unwrap();
        assert_eq!(
            cond.aggregation,
            Some(AggregationExpr::Near(ConditionExpr::And(vec![
                ident("other"),
                ConditionExpr::Not(Box::new(ident("noise"))),
            ])))
        );
    }

    #[test]
    fn test_unknown_aggregation_function() {
        let err = parse_condition("sel | median(x) > 1").unwrap_err();
        assert!(
            matches!(err, SigmaParserError::UnsupportedAggregationFunction(ref f) if f == "median"),
            "got: {err}"
        );
    }

    #[test]
    fn test_dangling_operator_fails() {
        assert!(matches!(
            parse_condition("selection and"),
            Err(SigmaParserError::Condition(_))
        ));
        assert!(matches!(
            parse_condition("(selection and filter"),
            Err(SigmaParserError::Condition(_))
        ));
    }
}

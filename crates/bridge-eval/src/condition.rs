//! Condition tree evaluation: Sigma condition AST → backend [`Expr`].
//!
//! Each identifier is replaced by the lowering of the named detection:
//! items of a mapping are AND-linked, the values of one item are OR-linked
//! (AND-linked with a trailing `all`), sub-detections of a list are
//! OR-linked.

use std::collections::HashMap;

use bridge_parser::{ConditionExpr, Detection, DetectionItem, Quantifier, SelectorPattern};

use crate::error::{EvalError, Result};
use crate::mapping::FieldMappings;
use crate::modifiers::{CaseMode, resolve_chain};
use crate::query::Expr;

/// Field mapping and case mode shared by every comparison of one rule.
#[derive(Debug, Clone, Copy)]
pub struct Lowering<'a> {
    pub mappings: &'a FieldMappings,
    pub case_mode: CaseMode,
}

/// Evaluate a condition tree against the rule's named detections.
pub fn evaluate_condition(
    expr: &ConditionExpr,
    detections: &HashMap<String, Detection>,
    lowering: &Lowering<'_>,
) -> Result<Expr> {
    match expr {
        ConditionExpr::Identifier(name) => {
            let detection = detections
                .get(name)
                .ok_or_else(|| EvalError::UnresolvedReference(name.clone()))?;
            lower_detection(detection, lowering)
        }

        ConditionExpr::And(exprs) => Ok(Expr::and(
            exprs
                .iter()
                .map(|e| evaluate_condition(e, detections, lowering))
                .collect::<Result<Vec<_>>>()?,
        )),

        ConditionExpr::Or(exprs) => Ok(Expr::or(
            exprs
                .iter()
                .map(|e| evaluate_condition(e, detections, lowering))
                .collect::<Result<Vec<_>>>()?,
        )),

        ConditionExpr::Not(inner) => Ok(Expr::negate(evaluate_condition(
            inner, detections, lowering,
        )?)),

        ConditionExpr::Selector {
            quantifier,
            pattern,
        } => {
            if let Quantifier::Count(n) = quantifier {
                return Err(EvalError::UnsupportedFeature(format!(
                    "'{n} of {pattern}' selector"
                )));
            }

            let mut names: Vec<&String> = match pattern {
                SelectorPattern::Them => detections
                    .keys()
                    .filter(|name| !name.starts_with('_'))
                    .collect(),
                SelectorPattern::Pattern(pat) => detections
                    .keys()
                    .filter(|name| pattern_matches(pat, name))
                    .collect(),
            };
            if names.is_empty() {
                return Err(EvalError::UnresolvedReference(pattern.to_string()));
            }
            names.sort();

            let parts = names
                .into_iter()
                .map(|name| lower_detection(&detections[name], lowering))
                .collect::<Result<Vec<_>>>()?;

            Ok(match quantifier {
                Quantifier::All => Expr::and(parts),
                _ => Expr::or(parts),
            })
        }
    }
}

/// Lower one named detection.
pub fn lower_detection(detection: &Detection, lowering: &Lowering<'_>) -> Result<Expr> {
    match detection {
        Detection::AllOf(items) => Ok(Expr::and(
            items
                .iter()
                .map(|item| lower_item(item, lowering))
                .collect::<Result<Vec<_>>>()?,
        )),
        Detection::AnyOf(subs) => Ok(Expr::or(
            subs.iter()
                .map(|d| lower_detection(d, lowering))
                .collect::<Result<Vec<_>>>()?,
        )),
        Detection::Keywords(values) => {
            let chain = resolve_chain::<&str>(&[], lowering.case_mode)?;
            let parts = values
                .iter()
                .map(|v| chain.bridge(None, &v.to_string()).map(Expr::from))
                .collect::<Result<Vec<_>>>()?;
            Ok(Expr::or(parts))
        }
    }
}

fn lower_item(item: &DetectionItem, lowering: &Lowering<'_>) -> Result<Expr> {
    let chain = resolve_chain(&item.field.modifiers, lowering.case_mode)?;
    let field = item
        .field
        .name
        .as_deref()
        .map(|name| lowering.mappings.resolve(name));

    let parts = item
        .values
        .iter()
        .map(|v| chain.bridge(field, &v.to_string()).map(Expr::from))
        .collect::<Result<Vec<_>>>()?;

    Ok(if chain.match_all() {
        Expr::and(parts)
    } else {
        Expr::or(parts)
    })
}

/// Check if a detection name matches a selector pattern (`*` matches any run
/// of characters).
fn pattern_matches(pattern: &str, name: &str) -> bool {
    let mut segments = pattern.split('*');
    let Some(first) = segments.next() else {
        return pattern == name;
    };
    let Some(mut rest) = name.strip_prefix(first) else {
        return false;
    };

    let tail: Vec<&str> = segments.collect();
    let Some((last, middle)) = tail.split_last() else {
        // no wildcard at all
        return rest.is_empty();
    };

    for segment in middle {
        match rest.find(segment) {
            Some(pos) => rest = &rest[pos + segment.len()..],
            None => return false,
        }
    }
    rest.len() >= last.len() && rest.ends_with(last)
}

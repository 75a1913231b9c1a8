//! Lowering of legacy aggregation clauses into `stats`/`sort` stages.
//!
//! ```text
//! count()                      → | sort -count
//! count() by g                 → | stats count by g | sort -count
//! count(f) by g                → | stats count by f,g | sort -count
//! avg(f) by g                  → | stats avg(f) AS average by f,g | sort -average
//! ```
//!
//! The comparison is appended as ` {op} {threshold}`.

use bridge_parser::{AggregationExpr, AggregationFunc};

use crate::error::{EvalError, Result};
use crate::mapping::FieldMappings;

/// Lower an aggregation clause, applying the field mapping to the
/// aggregated field and the group-by field.
pub fn lower_aggregation(expr: &AggregationExpr, mappings: &FieldMappings) -> Result<String> {
    match expr {
        AggregationExpr::Near(_) => Err(EvalError::UnsupportedFeature(
            "near aggregation".to_string(),
        )),
        AggregationExpr::Comparison {
            func,
            op,
            threshold,
        } => {
            let stage = lower_function(func, mappings)?;
            Ok(format!("{stage} {op} {threshold}"))
        }
    }
}

fn lower_function(func: &AggregationFunc, mappings: &FieldMappings) -> Result<String> {
    let field = func.field().map(|f| mappings.resolve(f));
    let group = func.grouped_by().map(|g| mappings.resolve(g));

    let (name, alias) = match func {
        AggregationFunc::Count { .. } => {
            return Ok(match (field, group) {
                (None, None) => "| sort -count".to_string(),
                (None, Some(g)) => format!("| stats count by {g} | sort -count"),
                (Some(f), None) => format!("| stats count by {f} | sort -count"),
                (Some(f), Some(g)) => format!("| stats count by {f},{g} | sort -count"),
            });
        }
        AggregationFunc::Average { .. } => ("avg", "average"),
        AggregationFunc::Sum { .. } => ("sum", "sum"),
        AggregationFunc::Min { .. } => ("min", "min"),
        AggregationFunc::Max { .. } => ("max", "max"),
    };

    let Some(field) = field else {
        return Err(EvalError::InvalidAggregation(format!(
            "{name}() needs a field to aggregate"
        )));
    };
    let by = match group {
        Some(g) => format!("{field},{g}"),
        None => field.to_string(),
    };
    Ok(format!(
        "| stats {name}({field}) AS {alias} by {by} | sort -{alias}"
    ))
}

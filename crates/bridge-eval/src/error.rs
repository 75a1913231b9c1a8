//! Translation-specific error types.

use thiserror::Error;

/// Errors that can occur while translating a rule into queries.
#[derive(Debug, Error)]
pub enum EvalError {
    /// The rule uses a construct the query language cannot express.
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),

    /// A modifier name is neither a comparator nor a value modifier.
    #[error("unknown modifier '{0}'")]
    UnknownModifier(String),

    /// A comparator appears before the end of the modifier chain.
    #[error("modifier '{0}' must be the last modifier in the chain")]
    InvalidModifierOrder(String),

    /// A detection referenced in a condition was not found.
    #[error("unresolved detection reference: {0}")]
    UnresolvedReference(String),

    /// A modifier combination cannot be applied to this item.
    #[error("invalid modifier combination: {0}")]
    InvalidModifiers(String),

    /// An aggregation clause is missing required parts.
    #[error("invalid aggregation: {0}")]
    InvalidAggregation(String),

    /// A parser error propagated during translation.
    #[error("parser error: {0}")]
    Parser(#[from] bridge_parser::SigmaParserError),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, EvalError>;

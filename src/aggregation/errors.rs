//! # Aggregation Errors

use thiserror::Error;

/// Result type for aggregation operations
pub type AggregationResult<T> = Result<T, AggregationError>;

/// Aggregation errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AggregationError {
    /// Field has no stored path (only COUNT is possible)
    #[error("[{field}] can't be aggregated")]
    NotAggregatable { field: String },

    /// Field type does not support the requested function
    #[error("[{field}] can't be used with [{function}]")]
    UnsupportedFunction { field: String, function: String },

    /// Store returned a value the converter cannot interpret
    #[error("Invalid aggregation result: {0}")]
    InvalidResult(String),
}

impl AggregationError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotAggregatable { .. } => "AGGREGATION_NOT_AGGREGATABLE",
            Self::UnsupportedFunction { .. } => "AGGREGATION_UNSUPPORTED_FUNCTION",
            Self::InvalidResult(_) => "AGGREGATION_INVALID_RESULT",
        }
    }
}

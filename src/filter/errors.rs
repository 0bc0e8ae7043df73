//! # Filter Errors
//!
//! Error types for condition compilation and in-memory testing.

use thiserror::Error;

/// Result type for filter operations
pub type FilterResult<T> = Result<T, FilterError>;

/// Filter errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FilterError {
    /// Enum name filter references a name the enum does not define
    #[error("Invalid value [{name}] for {field}_name")]
    InvalidEnumName {
        /// Underlying numeric field
        field: String,
        /// Offending name
        name: String,
    },

    /// Value cannot be interpreted as an unsigned big integer
    #[error("Invalid unsigned integer value: {0}")]
    InvalidBigUInt(String),

    /// Operator value has the wrong shape (e.g. `in` without an array)
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    /// Expression cannot be evaluated in memory (join sub-queries)
    #[error("Expression is not evaluable in memory: {0}")]
    NotEvaluable(String),

    /// Bound parameter referenced by an expression is missing
    #[error("Unknown bound parameter: @{0}")]
    UnknownParam(String),
}

impl FilterError {
    /// Create an invalid filter error
    pub fn invalid_filter(msg: impl Into<String>) -> Self {
        Self::InvalidFilter(msg.into())
    }

    /// Stable machine code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidEnumName { .. } => "FILTER_INVALID_ENUM_NAME",
            Self::InvalidBigUInt(_) => "FILTER_INVALID_BIG_UINT",
            Self::InvalidFilter(_) => "FILTER_INVALID",
            Self::NotEvaluable(_) => "FILTER_NOT_EVALUABLE",
            Self::UnknownParam(_) => "FILTER_UNKNOWN_PARAM",
        }
    }
}

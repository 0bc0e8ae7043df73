//! # Query Errors
//!
//! Collection-level umbrella error. Wraps the errors of the filter,
//! aggregation and data subsystems and maps every failure to an HTTP-like
//! status for the transport layer.

use thiserror::Error;

use crate::aggregation::AggregationError;
use crate::broker::DataError;
use crate::filter::FilterError;

/// Result type for collection operations
pub type QueryResult<T> = Result<T, QueryError>;

/// Collection query errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Aggregation(#[from] AggregationError),

    #[error(transparent)]
    Data(#[from] DataError),

    /// Access key was rejected
    #[error("Unauthorized")]
    Unauthorized,

    /// One request used two different access keys
    #[error("Request must use the same access key for all queries and mutations")]
    MultipleAccessKeys,

    #[error("Unknown collection [{0}]")]
    UnknownCollection(String),

    /// Shared state became unusable (poisoned lock)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl QueryError {
    /// Stable machine code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            Self::Filter(e) => e.code(),
            Self::Aggregation(e) => e.code(),
            Self::Data(e) => e.code(),
            Self::Unauthorized => "QUERY_UNAUTHORIZED",
            Self::MultipleAccessKeys => "QUERY_MULTIPLE_ACCESS_KEYS",
            Self::UnknownCollection(_) => "QUERY_UNKNOWN_COLLECTION",
            Self::Internal(_) => "QUERY_INTERNAL",
        }
    }

    /// HTTP-like status of the failure
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Unauthorized => 401,
            Self::Filter(_)
            | Self::Aggregation(_)
            | Self::MultipleAccessKeys
            | Self::UnknownCollection(_) => 400,
            Self::Data(_) | Self::Internal(_) => 500,
        }
    }
}

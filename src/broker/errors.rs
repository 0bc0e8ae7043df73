//! # Data Errors
//!
//! Failures of backing data sources and of the cold-result cache.

use thiserror::Error;

/// Result type for data source operations
pub type DataResult<T> = Result<T, DataError>;

/// Data source errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataError {
    /// A backing store rejected or failed a query
    #[error("Data source [{source_name}] failed: {message}")]
    Provider {
        source_name: String,
        message: String,
    },

    /// The query cache failed to read or write
    #[error("Query cache failed: {0}")]
    Cache(String),

    /// Cache key could not be derived from the query
    #[error("Cannot serialize query signature: {0}")]
    Signature(String),
}

impl DataError {
    pub fn provider(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Provider { .. } => "DATA_PROVIDER_FAILED",
            Self::Cache(_) => "DATA_CACHE_FAILED",
            Self::Signature(_) => "DATA_SIGNATURE_FAILED",
        }
    }
}

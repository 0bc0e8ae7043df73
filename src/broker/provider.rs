//! Backing store seam

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::errors::DataResult;

/// Data tier a query is routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSegment {
    /// Actively written documents; served by the mutable source alone
    Mutable,
    /// Finalized documents; served by the hot source plus cold archives
    Immutable,
}

/// Document store driver
#[async_trait]
pub trait DataProvider: Send + Sync {
    /// Label used in logs and errors
    fn name(&self) -> &str;

    /// Runs `text` with bound `vars` and returns the matching documents.
    async fn query(&self, text: &str, vars: &Map<String, Value>) -> DataResult<Vec<Value>>;

    /// Sorted index field sets of `collection`.
    async fn collection_indexes(&self, collection: &str) -> DataResult<Vec<Vec<String>>>;
}

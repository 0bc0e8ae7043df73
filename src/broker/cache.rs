//! Cold result cache
//!
//! Cold data never changes, so merged cold results are cached for the process
//! lifetime and never invalidated. Keys are the SHA-256 of the canonical JSON
//! signature `{orderBy, text, vars}`.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

use super::errors::{DataError, DataResult};
use super::merge::OrderBy;

/// Key/value store for merged cold results
#[async_trait]
pub trait QueryCache: Send + Sync {
    async fn get(&self, key: &str) -> DataResult<Option<Vec<Value>>>;

    async fn set(&self, key: &str, docs: &[Value]) -> DataResult<()>;
}

/// Derives the cache key of a query.
pub fn cache_key(text: &str, vars: &Map<String, Value>, order_by: &[OrderBy]) -> DataResult<String> {
    let signature = json!({
        "text": text,
        "vars": vars,
        "orderBy": order_by,
    });
    let canonical =
        serde_json::to_string(&signature).map_err(|e| DataError::Signature(e.to_string()))?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

/// In-process cache
#[derive(Debug, Default)]
pub struct MemoryQueryCache {
    entries: RwLock<HashMap<String, Vec<Value>>>,
}

impl MemoryQueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl QueryCache for MemoryQueryCache {
    async fn get(&self, key: &str) -> DataResult<Option<Vec<Value>>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| DataError::Cache("cache lock poisoned".into()))?;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, docs: &[Value]) -> DataResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| DataError::Cache("cache lock poisoned".into()))?;
        entries.insert(key.to_string(), docs.to_vec());
        Ok(())
    }
}

/// Cache that never stores anything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoQueryCache;

#[async_trait]
impl QueryCache for NoQueryCache {
    async fn get(&self, _key: &str) -> DataResult<Option<Vec<Value>>> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _docs: &[Value]) -> DataResult<()> {
        Ok(())
    }
}

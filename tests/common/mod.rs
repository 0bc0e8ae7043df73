//! Shared fakes for integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use qcore::aggregation::bigint;
use qcore::broker::{DataBroker, DataError, DataProvider, DataResult};
use qcore::filter::Condition;
use serde_json::{json, Map, Value};

/// Answers every query with the same documents and records query texts
pub struct FixedSource {
    name: String,
    docs: Vec<Value>,
    calls: AtomicUsize,
    texts: Mutex<Vec<String>>,
}

impl FixedSource {
    pub fn new(name: &str, docs: Vec<Value>) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            docs,
            calls: AtomicUsize::new(0),
            texts: Mutex::new(Vec::new()),
        })
    }

    pub fn empty(name: &str) -> Arc<Self> {
        Self::new(name, Vec::new())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().unwrap().clone()
    }
}

#[async_trait]
impl DataProvider for FixedSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn query(&self, text: &str, _vars: &Map<String, Value>) -> DataResult<Vec<Value>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts.lock().unwrap().push(text.to_string());
        Ok(self.docs.clone())
    }

    async fn collection_indexes(&self, _collection: &str) -> DataResult<Vec<Vec<String>>> {
        Ok(Vec::new())
    }
}

/// Fails every query
pub struct FailingSource;

#[async_trait]
impl DataProvider for FailingSource {
    fn name(&self) -> &str {
        "failing"
    }

    async fn query(&self, _text: &str, _vars: &Map<String, Value>) -> DataResult<Vec<Value>> {
        Err(DataError::provider("failing", "connection reset"))
    }

    async fn collection_indexes(&self, _collection: &str) -> DataResult<Vec<Vec<String>>> {
        Ok(Vec::new())
    }
}

/// Store of big-uint documents that answers split-sum aggregations the
/// way the real store evaluates `hi_part_expr` / `lo_part_expr`.
///
/// Documents are selected with `filter`, which must be the filter the
/// aggregation was compiled from.
pub struct SplitSumStore {
    pub doc_type: Condition,
    pub docs: Vec<Value>,
    pub filter: Value,
    pub field: String,
    pub prefix: usize,
}

#[async_trait]
impl DataProvider for SplitSumStore {
    fn name(&self) -> &str {
        "split-sum"
    }

    async fn query(&self, text: &str, _vars: &Map<String, Value>) -> DataResult<Vec<Value>> {
        if !text.contains("COLLECT AGGREGATE") {
            return Ok(Vec::new());
        }
        let mut columns = bigint::SplitParts::default();
        for doc in &self.docs {
            let passes = self
                .doc_type
                .test_document(doc, &self.filter)
                .map_err(|e| DataError::provider("split-sum", e.to_string()))?;
            if !passes {
                continue;
            }
            let stored = doc[self.field.as_str()].as_str().unwrap_or_default();
            let parts = bigint::split_stored(self.prefix, stored)
                .map_err(|e| DataError::provider("split-sum", e.to_string()))?;
            columns += &parts;
        }
        let hi = u64::try_from(&columns.hi).map_err(|e| DataError::provider("split-sum", e.to_string()))?;
        let lo = u64::try_from(&columns.lo).map_err(|e| DataError::provider("split-sum", e.to_string()))?;
        Ok(vec![json!([{ "a": hi, "b": lo }])])
    }

    async fn collection_indexes(&self, _collection: &str) -> DataResult<Vec<Vec<String>>> {
        Ok(Vec::new())
    }
}

/// Broker whose every tier is `source`
pub fn single_source_broker(source: Arc<dyn DataProvider>) -> DataBroker {
    DataBroker::new(source.clone(), source, Vec::new())
}

//! Tiered query execution

use std::sync::Arc;

use futures_util::future::try_join_all;
use serde_json::{Map, Value};

use super::cache::{cache_key, MemoryQueryCache, QueryCache};
use super::errors::DataResult;
use super::merge::{combine_results, OrderBy};
use super::provider::{DataProvider, DataSegment};
use crate::observability::{log_event, Event, MetricsRegistry};

/// One compiled query routed through a broker
#[derive(Debug, Clone, PartialEq)]
pub struct DataQuery {
    pub segment: DataSegment,
    pub text: String,
    pub vars: Map<String, Value>,
    pub order_by: Vec<OrderBy>,
}

impl DataQuery {
    pub fn new(segment: DataSegment, text: impl Into<String>, vars: Map<String, Value>) -> Self {
        Self {
            segment,
            text: text.into(),
            vars,
            order_by: Vec::new(),
        }
    }

    pub fn with_order(mut self, order_by: Vec<OrderBy>) -> Self {
        self.order_by = order_by;
        self
    }
}

/// Executes queries over one mutable source, one hot immutable source and
/// any number of cold immutable sources.
///
/// Merged cold results are cached forever: cold data never changes.
/// Concurrent identical misses may both query the cold sources; the later
/// `set` overwrites the earlier one with the same documents.
pub struct DataBroker {
    name: String,
    mutable: Arc<dyn DataProvider>,
    immutable_hot: Arc<dyn DataProvider>,
    immutable_cold: Vec<Arc<dyn DataProvider>>,
    cold_cache: Arc<dyn QueryCache>,
    metrics: Arc<MetricsRegistry>,
}

impl DataBroker {
    pub fn new(
        mutable: Arc<dyn DataProvider>,
        immutable_hot: Arc<dyn DataProvider>,
        immutable_cold: Vec<Arc<dyn DataProvider>>,
    ) -> Self {
        Self {
            name: "data".to_string(),
            mutable,
            immutable_hot,
            immutable_cold,
            cold_cache: Arc::new(MemoryQueryCache::new()),
            metrics: Arc::new(MetricsRegistry::new()),
        }
    }

    /// Label used in log lines
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn QueryCache>) -> Self {
        self.cold_cache = cache;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mutable(&self) -> &Arc<dyn DataProvider> {
        &self.mutable
    }

    pub fn cold_source_count(&self) -> usize {
        self.immutable_cold.len()
    }

    /// Runs `query` against the sources of its segment.
    pub async fn query(&self, query: &DataQuery) -> DataResult<Vec<Value>> {
        if query.segment == DataSegment::Mutable {
            return self.mutable.query(&query.text, &query.vars).await;
        }
        let (hot, cold) = tokio::try_join!(
            self.immutable_hot.query(&query.text, &query.vars),
            self.query_immutable_cold(query),
        )?;
        Ok(combine_results(vec![hot, cold], &query.order_by))
    }

    /// Runs `query` against every cold source, through the cold cache.
    pub async fn query_immutable_cold(&self, query: &DataQuery) -> DataResult<Vec<Value>> {
        if self.immutable_cold.is_empty() {
            return Ok(Vec::new());
        }
        let key = cache_key(&query.text, &query.vars, &query.order_by)?;
        if let Some(docs) = self.cold_cache.get(&key).await? {
            self.metrics.increment_cold_cache_hits();
            log_event(Event::ColdCacheHit, &[("broker", self.name.as_str())]);
            return Ok(docs);
        }
        self.metrics.increment_cold_cache_misses();
        log_event(Event::ColdCacheMiss, &[("broker", self.name.as_str())]);

        let results = try_join_all(
            self.immutable_cold
                .iter()
                .map(|source| source.query(&query.text, &query.vars)),
        )
        .await?;
        let docs = combine_results(results, &query.order_by);
        self.cold_cache.set(&key, &docs).await?;
        Ok(docs)
    }
}

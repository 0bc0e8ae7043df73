//! Collection registry
//!
//! Builds the blockchain collections over one fast and one slow broker and
//! routes upsert events and operation cancellations to them.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde_json::Value;

use super::access::AccessControl;
use super::collection::{Backend, Collection};
use super::errors::{QueryError, QueryResult};
use super::info::CollectionInfo;
use crate::broker::DataBroker;
use crate::config::QConfig;
use crate::observability::MetricsRegistry;
use crate::schema;

pub struct Database {
    collections: BTreeMap<String, Arc<Collection>>,
    backend: Backend,
}

impl Database {
    /// Registers every blockchain collection with its declared indexes.
    pub fn new(
        config: &QConfig,
        fast: DataBroker,
        slow: DataBroker,
        access: Arc<dyn AccessControl>,
    ) -> Self {
        let backend = Backend::new(config, fast, slow, access);
        let collections = schema::blockchain()
            .into_iter()
            .map(|schema| {
                let info = CollectionInfo::new(&schema.name, schema.indexes);
                let collection = Collection::new(info, schema.doc_type, backend.clone());
                (schema.name, Arc::new(collection))
            })
            .collect();
        Self {
            collections,
            backend,
        }
    }

    /// Like [`Database::new`], with index lists merged from the indexes the
    /// fast broker's mutable store reports.
    pub async fn open(
        config: &QConfig,
        fast: DataBroker,
        slow: DataBroker,
        access: Arc<dyn AccessControl>,
    ) -> QueryResult<Self> {
        let backend = Backend::new(config, fast, slow, access);
        let mut collections = BTreeMap::new();
        for schema in schema::blockchain() {
            let store = backend.fast.mutable();
            let info = CollectionInfo::discover(&schema.name, schema.indexes, store.as_ref()).await?;
            let collection = Collection::new(info, schema.doc_type, backend.clone());
            collections.insert(schema.name, Arc::new(collection));
        }
        Ok(Self {
            collections,
            backend,
        })
    }

    pub fn collection(&self, name: &str) -> QueryResult<&Arc<Collection>> {
        self.collections
            .get(name)
            .ok_or_else(|| QueryError::UnknownCollection(name.to_string()))
    }

    pub fn collections(&self) -> impl Iterator<Item = &Arc<Collection>> {
        self.collections.values()
    }

    /// Delivers an inserted or updated document to the listeners of
    /// `collection`.
    pub fn on_document_upsert(&self, collection: &str, doc: &Value) -> QueryResult<usize> {
        Ok(self.collection(collection)?.on_document_upsert(doc))
    }

    /// Finishes pending wait-fors of `operation_ids` in every collection.
    pub fn finish_operations(&self, operation_ids: &HashSet<String>) -> usize {
        self.collections
            .values()
            .map(|collection| collection.finish_operations(operation_ids))
            .sum()
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.backend.metrics
    }
}

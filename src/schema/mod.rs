//! Blockchain collection schema
//!
//! Document type descriptors and declared indexes for the five collections
//! served by the query core.

mod indexes;
pub mod types;

use std::sync::Arc;

use crate::filter::Condition;

pub use indexes::declared_indexes;

/// Collection names in registration order
pub const COLLECTIONS: [&str; 5] = [
    "accounts",
    "messages",
    "transactions",
    "blocks",
    "blocks_signatures",
];

/// Type and index declaration of one collection
#[derive(Debug, Clone)]
pub struct CollectionSchema {
    pub name: String,
    pub doc_type: Arc<Condition>,
    pub indexes: Vec<Vec<String>>,
}

/// Document type of a known collection
pub fn doc_type(collection: &str) -> Option<Condition> {
    match collection {
        "accounts" => Some(types::account()),
        "messages" => Some(types::message()),
        "transactions" => Some(types::transaction()),
        "blocks" => Some(types::block_base()),
        "blocks_signatures" => Some(types::block_signatures()),
        _ => None,
    }
}

/// Schemas of all blockchain collections
pub fn blockchain() -> Vec<CollectionSchema> {
    COLLECTIONS
        .iter()
        .filter_map(|name| {
            doc_type(name).map(|ty| CollectionSchema {
                name: name.to_string(),
                doc_type: Arc::new(ty),
                indexes: declared_indexes(name),
            })
        })
        .collect()
}

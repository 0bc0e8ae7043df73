//! # Data Broker
//!
//! Routes compiled queries to the mutable, hot and cold data tiers, merges
//! and deduplicates their results, and caches merged cold results.

#[allow(clippy::module_inception)]
mod broker;
mod cache;
mod errors;
mod merge;
mod provider;

pub use broker::{DataBroker, DataQuery};
pub use cache::{cache_key, MemoryQueryCache, NoQueryCache, QueryCache};
pub use errors::{DataError, DataResult};
pub use merge::{combine_results, compare_docs, OrderBy, SortDirection};
pub use provider::{DataProvider, DataSegment};

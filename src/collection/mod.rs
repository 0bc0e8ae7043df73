//! # Collection Executor
//!
//! Per-collection query execution:
//!
//! - access resolution and account scoping
//! - query plans (condition, physical order, clamped limit, query text)
//! - cached fast/slow classification and broker routing
//! - the bounded wait-for race between polling, pushed upserts and a timeout
//! - aggregations, push subscriptions and `wait_for_doc`
//!
//! `Database` owns one `Collection` per blockchain collection.

mod access;
#[allow(clippy::module_inception)]
mod collection;
mod database;
mod errors;
mod info;
mod listeners;
mod plan;
mod slow_detector;
mod wait_for;

pub use access::{access_scope, AccessControl, AccessRights, GrantAll, RequestContext};
pub use collection::{AggregateArgs, Backend, Collection, SubscribeArgs, Subscription};
pub use database::Database;
pub use errors::{QueryError, QueryResult};
pub use info::{segment_of, CollectionInfo};
pub use listeners::{DocPredicate, ListenerEvent, ListenerId, UpsertListener, UpsertStream};
pub use plan::{
    is_empty_filter, physical_order_path, query_text, CompiledCondition, QueryArgs, QueryPlan,
    MAX_LIMIT,
};
pub use slow_detector::is_fast_query;
pub use wait_for::{RaceWinner, WaitFor, WaitForOutcome};

//! qcore - query-serving core of a blockchain document store
//!
//! Compiles declarative filters into store query text and equivalent
//! in-memory predicates, builds aggregations with exact big-integer sums,
//! fans queries out over mutable, hot and cold data sources, and serves
//! bounded wait-for queries that race polling against pushed upserts.

pub mod aggregation;
pub mod broker;
pub mod cli;
pub mod collection;
pub mod config;
pub mod filter;
pub mod observability;
pub mod schema;

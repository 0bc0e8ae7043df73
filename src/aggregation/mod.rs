//! # Aggregation Engine
//!
//! Builds one combined `COLLECT AGGREGATE` query for a list of field
//! aggregations and converts the returned row back to application values,
//! reconstructing full-precision sums of 64-bit and 1024-bit fields.

pub mod bigint;
mod errors;
mod fields;
mod helper;

pub use errors::{AggregationError, AggregationResult};
pub use fields::{ScalarField, ScalarFieldMap, ScalarType};
pub use helper::{
    AggregationContext, AggregationFn, AggregationHelper, AggregationQuery, FieldAggregation,
    QueryBuilder, QueryParts, ResultConverter,
};

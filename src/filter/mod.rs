//! # Filter Engine
//!
//! Compiles user filters into query-language conditions and tests the same
//! filters against in-memory documents.
//!
//! ## Components
//!
//! - `Condition`: per-field-type compile/test pair
//! - `QlExpr`: compiled expression; renders to query text and evaluates in memory
//! - `BoundParams`: `@vN` parameter accumulator owned by one query
//! - big-uint codec for 64-bit and 1024-bit fields

mod biguint;
mod condition;
mod errors;
mod params;
mod ql;
mod scalar;
mod value;

pub use biguint::{
    convert_big_uint, decode_big_uint, encode_big_uint, parse_big_uint, resolve_big_uint,
    U1024_PREFIX, U64_PREFIX,
};
pub use condition::{Condition, EnumNameResolver, KEY_FIELD};
pub use errors::{FilterError, FilterResult};
pub use params::BoundParams;
pub use ql::{CompareOp, Connective, QlExpr, CURRENT};
pub use scalar::{ScalarKind, ScalarOp};
pub use value::{compare_values, to_ql_string, value_at_path, values_equal};

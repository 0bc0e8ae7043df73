//! Aggregation Scenario Tests
//!
//! End-to-end aggregations through `Database`:
//! - big-uint sums are exact, including past 2^53
//! - unsupported field/function pairs fail before any query is issued
//! - unsatisfiable filters skip the store

mod common;

use std::sync::Arc;

use common::{single_source_broker, FixedSource, SplitSumStore};
use qcore::aggregation::{AggregationFn, FieldAggregation};
use qcore::collection::{AggregateArgs, Database, GrantAll, QueryError, RequestContext};
use qcore::config::QConfig;
use num_bigint::BigUint;
use proptest::prelude::*;
use qcore::aggregation::bigint;
use qcore::filter::{convert_big_uint, encode_big_uint, Condition, U1024_PREFIX, U64_PREFIX};
use qcore::schema::types;
use serde_json::{json, Value};

// =============================================================================
// Helper Functions
// =============================================================================

fn stored_balance(hex: &str) -> Value {
    convert_big_uint(U1024_PREFIX, &json!(hex)).unwrap()
}

fn account(key: &str, balance: &str) -> Value {
    json!({ "_key": key, "balance": stored_balance(balance) })
}

/// Account documents whose `balance` is stored as a 64-bit value
fn u64_balance_type() -> Condition {
    Condition::collection([
        ("id", Condition::string()),
        ("balance", Condition::BigUInt(U64_PREFIX)),
    ])
}

fn u64_account(key: &str, balance: &str) -> Value {
    json!({ "_key": key, "balance": convert_big_uint(U64_PREFIX, &json!(balance)).unwrap() })
}

fn wide_value() -> impl Strategy<Value = BigUint> {
    prop::collection::vec(any::<u8>(), 0..=128).prop_map(|bytes| BigUint::from_bytes_be(&bytes))
}

fn database_over(store: SplitSumStore) -> Database {
    let store = Arc::new(store);
    Database::new(
        &QConfig::default(),
        single_source_broker(store.clone()),
        single_source_broker(store),
        Arc::new(GrantAll),
    )
}

fn balance_sum(filter: Value) -> AggregateArgs {
    AggregateArgs {
        filter: Some(filter),
        fields: vec![FieldAggregation::new("balance", AggregationFn::Sum)],
        access_key: None,
    }
}

// =============================================================================
// Big-Integer Sums
// =============================================================================

/// Only documents above the bound are summed.
#[tokio::test]
async fn test_filtered_balance_sum() {
    let filter = json!({"balance": {"gt": "0x05"}});
    let db = database_over(SplitSumStore {
        doc_type: u64_balance_type(),
        docs: vec![
            u64_account("a", "0x05"),
            u64_account("b", "0x0a"),
            u64_account("c", "0x03"),
        ],
        filter: filter.clone(),
        field: "balance".to_string(),
        prefix: U64_PREFIX,
    });

    let result = db
        .collection("accounts")
        .unwrap()
        .aggregate(&RequestContext::new(), &balance_sum(filter))
        .await
        .unwrap();
    assert_eq!(result, vec![json!("10")]);
}

/// Sums past the double-precision range stay exact.
#[tokio::test]
async fn test_sum_beyond_double_precision() {
    let filter = json!({"balance": {"ge": "0x0"}});
    let db = database_over(SplitSumStore {
        doc_type: types::account(),
        docs: vec![
            account("a", "0xffffffffffffffff"),
            account("b", "0x1"),
            account("c", "0x20000000000001"),
        ],
        filter: filter.clone(),
        field: "balance".to_string(),
        prefix: U1024_PREFIX,
    });

    let result = db
        .collection("accounts")
        .unwrap()
        .aggregate(&RequestContext::new(), &balance_sum(filter))
        .await
        .unwrap();
    // 2^64 + 2^53 + 1
    assert_eq!(result, vec![json!("18455751272964292609")]);
}

// =============================================================================
// Failures And Skips
// =============================================================================

/// Strings can only be counted or compared.
#[tokio::test]
async fn test_unsupported_function_is_rejected() {
    let source = FixedSource::empty("store");
    let db = Database::new(
        &QConfig::default(),
        single_source_broker(source.clone()),
        single_source_broker(source.clone()),
        Arc::new(GrantAll),
    );
    let args = AggregateArgs {
        fields: vec![FieldAggregation::new("code", AggregationFn::Sum)],
        ..AggregateArgs::default()
    };

    let err = db
        .collection("accounts")
        .unwrap()
        .aggregate(&RequestContext::new(), &args)
        .await
        .unwrap_err();
    assert!(matches!(err, QueryError::Aggregation(_)));
    assert_eq!(err.status_code(), 400);
    assert_eq!(source.calls(), 0);
    assert_eq!(db.metrics().snapshot().query_failed, 1);
}

/// A filter with no known keys can never match.
#[tokio::test]
async fn test_unsatisfiable_filter_skips_store() {
    let source = FixedSource::empty("store");
    let db = Database::new(
        &QConfig::default(),
        single_source_broker(source.clone()),
        single_source_broker(source.clone()),
        Arc::new(GrantAll),
    );
    let args = AggregateArgs {
        filter: Some(json!({"no_such_field": {"eq": 1}})),
        ..AggregateArgs::default()
    };

    let result = db
        .collection("blocks")
        .unwrap()
        .aggregate(&RequestContext::new(), &args)
        .await
        .unwrap();
    assert!(result.is_empty());
    assert_eq!(source.calls(), 0);
}

// =============================================================================
// Split-integer Properties
// =============================================================================

proptest! {
    /// Splitting any value up to 1024 bits and joining the parts gives the
    /// value back, and the stored form splits the same way.
    #[test]
    fn prop_split_round_trips(value in wide_value()) {
        let parts = bigint::split(&value);
        prop_assert_eq!(parts.join(), value.clone());

        let stored = encode_big_uint(U1024_PREFIX, &value);
        prop_assert_eq!(bigint::split_stored(U1024_PREFIX, &stored).unwrap(), parts);
    }

    /// Column sums of stored 1024-bit values rebuild the exact total; the
    /// average truncates.
    #[test]
    fn prop_wide_split_sums_are_exact(values in prop::collection::vec(wide_value(), 1..8)) {
        let mut columns = bigint::SplitParts::default();
        let mut expected = BigUint::default();
        for value in &values {
            let stored = encode_big_uint(U1024_PREFIX, value);
            columns += &bigint::split_stored(U1024_PREFIX, &stored).unwrap();
            expected += value;
        }
        prop_assert_eq!(columns.join(), expected.clone());

        let count = values.len() as u64;
        let avg = bigint::average(columns.join(), &json!(count)).unwrap();
        prop_assert_eq!(avg, expected / BigUint::from(count));
    }

    /// 64-bit sums rebuild exactly from the numeric columns the store
    /// returns.
    #[test]
    fn prop_u64_split_sums_are_exact(values in prop::collection::vec(any::<u64>(), 1..8)) {
        let mut columns = bigint::SplitParts::default();
        let mut expected = BigUint::default();
        for value in &values {
            let stored = encode_big_uint(U64_PREFIX, &BigUint::from(*value));
            columns += &bigint::split_stored(U64_PREFIX, &stored).unwrap();
            expected += BigUint::from(*value);
        }
        let hi = u64::try_from(&columns.hi).unwrap();
        let lo = u64::try_from(&columns.lo).unwrap();
        let total = bigint::reconstruct(&json!(hi), &json!(lo)).unwrap();
        prop_assert_eq!(total, expected);
    }
}

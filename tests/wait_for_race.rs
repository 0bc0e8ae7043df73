//! Wait-for Race Tests
//!
//! Tests for queries with a timeout:
//! - a pushed matching document wins over the poll loop
//! - the timeout resolves with no documents
//! - poll failures fail the query
//! - the listener and the wait gauge are released whichever branch wins
//!
//! All tests run on paused time.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{single_source_broker, FailingSource, FixedSource};
use qcore::collection::{Database, GrantAll, QueryArgs, QueryError, RequestContext};
use qcore::config::QConfig;
use serde_json::{json, Value};
use tokio::time::Instant;

// =============================================================================
// Helper Functions
// =============================================================================

fn database_over(docs: Vec<Value>) -> (Database, Arc<FixedSource>) {
    let source = FixedSource::new("store", docs);
    let db = Database::new(
        &QConfig::default(),
        single_source_broker(source.clone()),
        single_source_broker(source.clone()),
        Arc::new(GrantAll),
    );
    (db, source)
}

fn wait_args(filter: Value, timeout_ms: u64) -> QueryArgs {
    QueryArgs {
        timeout: Some(timeout_ms),
        ..QueryArgs::with_filter(filter)
    }
}

// =============================================================================
// Race Outcomes
// =============================================================================

/// A matching upsert after one second resolves a three second wait.
#[tokio::test(start_paused = true)]
async fn test_pushed_document_wins() {
    let (db, _source) = database_over(Vec::new());
    let blocks = db.collection("blocks").unwrap().clone();

    let pusher = {
        let blocks = blocks.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            blocks.on_document_upsert(&json!({"_key": "b6", "seq_no": 6}));
            blocks.on_document_upsert(&json!({"_key": "b7", "seq_no": 7}))
        })
    };

    let start = Instant::now();
    let docs = blocks
        .query(
            &RequestContext::new(),
            &wait_args(json!({"seq_no": {"eq": 7}}), 3_000),
        )
        .await
        .unwrap();

    assert_eq!(docs, vec![json!({"_key": "b7", "seq_no": 7})]);
    assert!(start.elapsed() < Duration::from_secs(2));
    assert_eq!(pusher.await.unwrap(), 1);
    assert_eq!(blocks.listener_count(), 0);
    assert_eq!(db.metrics().snapshot().wait_for_active, 0);
}

/// Without rows or events the wait resolves empty at its timeout.
#[tokio::test(start_paused = true)]
async fn test_timeout_resolves_empty() {
    let (db, source) = database_over(Vec::new());
    let blocks = db.collection("blocks").unwrap();

    let start = Instant::now();
    let docs = blocks
        .query(
            &RequestContext::new(),
            &wait_args(json!({"seq_no": {"eq": 7}}), 3_000),
        )
        .await
        .unwrap();

    assert!(docs.is_empty());
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(3));
    assert!(elapsed < Duration::from_secs(4));
    // the poll interval (5s) never elapsed
    assert_eq!(source.calls(), 1);
    assert_eq!(blocks.listener_count(), 0);
    assert_eq!(db.metrics().snapshot().wait_for_active, 0);
}

/// Rows already present are returned by the first poll.
#[tokio::test(start_paused = true)]
async fn test_existing_rows_win_immediately() {
    let (db, _source) = database_over(vec![json!({"_key": "b7", "seq_no": 7})]);
    let blocks = db.collection("blocks").unwrap();

    let start = Instant::now();
    let docs = blocks
        .query(
            &RequestContext::new(),
            &wait_args(json!({"seq_no": {"eq": 7}}), 3_000),
        )
        .await
        .unwrap();

    assert_eq!(docs.len(), 1);
    assert_eq!(start.elapsed(), Duration::ZERO);
    assert_eq!(blocks.listener_count(), 0);
}

/// A failing poll fails the query instead of waiting for the timeout.
#[tokio::test(start_paused = true)]
async fn test_poll_failure_propagates() {
    let db = Database::new(
        &QConfig::default(),
        single_source_broker(Arc::new(FailingSource)),
        single_source_broker(Arc::new(FailingSource)),
        Arc::new(GrantAll),
    );
    let blocks = db.collection("blocks").unwrap();

    let err = blocks
        .query(
            &RequestContext::new(),
            &wait_args(json!({"seq_no": {"eq": 7}}), 3_000),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, QueryError::Data(_)));
    assert_eq!(err.status_code(), 500);
    assert_eq!(blocks.listener_count(), 0);
    let snapshot = db.metrics().snapshot();
    assert_eq!(snapshot.query_failed, 1);
    assert_eq!(snapshot.wait_for_active, 0);
}

/// Finishing the wait's operation resolves it empty.
#[tokio::test(start_paused = true)]
async fn test_finished_operation_resolves_empty() {
    let (db, _source) = database_over(Vec::new());
    let db = Arc::new(db);

    let finisher = {
        let db = db.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            let ids = ["op-1".to_string()].into_iter().collect();
            db.finish_operations(&ids)
        })
    };

    let args = QueryArgs {
        operation_id: Some("op-1".to_string()),
        ..wait_args(json!({"seq_no": {"eq": 7}}), 3_000)
    };
    let start = Instant::now();
    let docs = db
        .collection("blocks")
        .unwrap()
        .query(&RequestContext::new(), &args)
        .await
        .unwrap();

    assert!(docs.is_empty());
    assert!(start.elapsed() < Duration::from_secs(1));
    assert_eq!(finisher.await.unwrap(), 1);
}

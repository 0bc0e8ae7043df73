//! Configuration Tests
//!
//! Tests for loading configuration files and for the settings taking
//! effect on a `Database`.

mod common;

use std::fs;
use std::sync::Arc;

use common::FixedSource;
use qcore::broker::{DataBroker, DataProvider};
use qcore::collection::{Database, GrantAll, QueryArgs, RequestContext};
use qcore::config::QConfig;
use serde_json::json;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn write_config(dir: &TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join("qcore.json");
    fs::write(&path, content).unwrap();
    path
}

fn tiered_broker(cold: Arc<FixedSource>) -> DataBroker {
    let cold: Vec<Arc<dyn DataProvider>> = vec![cold];
    DataBroker::new(FixedSource::empty("mutable"), FixedSource::empty("hot"), cold)
}

// =============================================================================
// Loading
// =============================================================================

/// A file overrides only the settings it names.
#[test]
fn test_load_partial_file() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"{
            "query": {"default_limit": 20, "wait_for_poll_interval_ms": 250},
            "slow_queries_data": {"mutable": "replica", "cold": ["archive-2019", "archive-2020"]}
        }"#,
    );

    let config = QConfig::load(&path).unwrap();
    assert_eq!(config.query.default_limit, 20);
    assert_eq!(config.query.wait_for_poll_interval_ms, 250);
    assert_eq!(config.query.max_limit, 50);
    assert_eq!(config.data, QConfig::default().data);
    assert_eq!(config.slow_queries_data.mutable, "replica");
    assert_eq!(config.slow_queries_data.hot, "arangodb");
    assert_eq!(config.slow_queries_data.cold.len(), 2);
}

/// Missing, malformed and out-of-range files are told apart.
#[test]
fn test_load_errors() {
    let dir = TempDir::new().unwrap();

    let missing = QConfig::load(&dir.path().join("absent.json")).unwrap_err();
    assert_eq!(missing.code(), "CONFIG_READ_FAILED");

    let path = write_config(&dir, r#"{"query": "#);
    assert_eq!(QConfig::load(&path).unwrap_err().code(), "CONFIG_PARSE_FAILED");

    let path = write_config(&dir, r#"{"query": {"default_limit": 0}}"#);
    assert_eq!(QConfig::load(&path).unwrap_err().code(), "CONFIG_INVALID");
}

// =============================================================================
// Effect on Queries
// =============================================================================

/// The configured default limit reaches the query text.
#[tokio::test]
async fn test_default_limit_applies() {
    let config = QConfig::from_json(r#"{"query": {"default_limit": 7}}"#).unwrap();
    let source = FixedSource::empty("store");
    let db = Database::new(
        &config,
        common::single_source_broker(source.clone()),
        common::single_source_broker(source.clone()),
        Arc::new(GrantAll),
    );

    db.collection("blocks")
        .unwrap()
        .query(&RequestContext::new(), &QueryArgs::with_filter(json!({"seq_no": {"eq": 1}})))
        .await
        .unwrap();
    assert!(source.texts()[0].contains("LIMIT 7"));
}

/// With the cold cache disabled every query reaches the cold sources.
#[tokio::test]
async fn test_cold_cache_can_be_disabled() {
    for (enabled, expected_cold_calls) in [(true, 1), (false, 2)] {
        let config = QConfig {
            query: qcore::config::QueryConfig {
                cold_cache_enabled: enabled,
                ..Default::default()
            },
            ..Default::default()
        };
        let fast_cold = FixedSource::new("cold", vec![json!({"_key": "b1", "seq_no": 1})]);
        let slow_cold = FixedSource::empty("slow-cold");
        let db = Database::new(
            &config,
            tiered_broker(fast_cold.clone()),
            tiered_broker(slow_cold),
            Arc::new(GrantAll),
        );
        let blocks = db.collection("blocks").unwrap();
        let args = QueryArgs::with_filter(json!({"seq_no": {"eq": 1}}));

        for _ in 0..2 {
            let docs = blocks.query(&RequestContext::new(), &args).await.unwrap();
            assert_eq!(docs.len(), 1);
        }
        assert_eq!(fast_cold.calls(), expected_cold_calls);
    }
}

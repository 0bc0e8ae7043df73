//! Configuration
//!
//! Loaded from a JSON file. Every field has a default, so an empty object
//! (or no file at all, via `QConfig::default()`) is a valid configuration.

mod errors;

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::collection::MAX_LIMIT;

pub use errors::{ConfigError, ConfigResult};

/// Query execution settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Clamp applied to every requested limit
    pub max_limit: usize,
    /// Limit used when the request has none
    pub default_limit: usize,
    /// Delay between empty wait-for polls
    pub wait_for_poll_interval_ms: u64,
    /// Timeout of `wait_for_doc` when the caller gives none
    pub default_wait_for_doc_timeout_ms: u64,
    pub cold_cache_enabled: bool,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_limit: MAX_LIMIT,
            default_limit: MAX_LIMIT,
            wait_for_poll_interval_ms: 5_000,
            default_wait_for_doc_timeout_ms: 40_000,
            cold_cache_enabled: true,
        }
    }
}

/// Names of the sources behind one broker, used as log labels
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub mutable: String,
    pub hot: String,
    pub cold: Vec<String>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            mutable: "arangodb".to_string(),
            hot: "arangodb".to_string(),
            cold: Vec::new(),
        }
    }
}

/// Process configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QConfig {
    pub query: QueryConfig,
    /// Sources of the fast (indexed) broker
    pub data: DataConfig,
    /// Sources of the slow (reporting replica) broker
    pub slow_queries_data: DataConfig,
}

impl QConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read(e.to_string()))?;
        Self::from_json(&content)
    }

    /// Parse and validate configuration JSON
    pub fn from_json(content: &str) -> ConfigResult<Self> {
        let config: QConfig =
            serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let query = &self.query;
        if query.max_limit == 0 || query.max_limit > MAX_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "query.max_limit must be in 1..={}, got {}",
                MAX_LIMIT, query.max_limit
            )));
        }
        if query.default_limit == 0 {
            return Err(ConfigError::Invalid("query.default_limit must be > 0".into()));
        }
        if query.wait_for_poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "query.wait_for_poll_interval_ms must be > 0".into(),
            ));
        }
        Ok(())
    }
}

//! CLI errors
//!
//! Every failure is reported as `{"status":"error",code,message}` and ends
//! the process with a non-zero exit code.

use std::io;

use thiserror::Error;

use crate::collection::QueryError;
use crate::config::ConfigError;

/// Stable code reported in the error envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliErrorCode {
    ConfigError,
    IoError,
    /// Request JSON does not describe a query
    InvalidRequest,
    QueryFailed,
}

impl CliErrorCode {
    pub fn code(self) -> &'static str {
        match self {
            Self::ConfigError => "QCORE_CLI_CONFIG_ERROR",
            Self::IoError => "QCORE_CLI_IO_ERROR",
            Self::InvalidRequest => "QCORE_CLI_INVALID_REQUEST",
            Self::QueryFailed => "QCORE_CLI_QUERY_FAILED",
        }
    }
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("QCORE_CLI_CONFIG_ERROR: {code}: {0}", code = .0.code())]
    Config(#[from] ConfigError),

    #[error("QCORE_CLI_IO_ERROR: {0}")]
    Io(String),

    #[error("QCORE_CLI_INVALID_REQUEST: {0}")]
    InvalidRequest(String),

    #[error("QCORE_CLI_QUERY_FAILED: {code}: {0}", code = .0.code())]
    Query(#[from] QueryError),
}

impl CliError {
    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn code(&self) -> CliErrorCode {
        match self {
            Self::Config(_) => CliErrorCode::ConfigError,
            Self::Io(_) => CliErrorCode::IoError,
            Self::InvalidRequest(_) => CliErrorCode::InvalidRequest,
            Self::Query(_) => CliErrorCode::QueryFailed,
        }
    }

    pub fn code_str(&self) -> &'static str {
        self.code().code()
    }

    /// Envelope message: the display text without the CLI code prefix.
    /// Wrapped errors keep their own code in front.
    pub fn message(&self) -> String {
        match self {
            Self::Config(e) => format!("{}: {}", e.code(), e),
            Self::Query(e) => format!("{}: {}", e.code(), e),
            Self::Io(msg) | Self::InvalidRequest(msg) => msg.clone(),
        }
    }
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::Io(format!("JSON error: {}", e))
    }
}

pub type CliResult<T> = Result<T, CliError>;

//! CLI module for qcore
//!
//! Provides offline one-shot commands over stdin/stdout JSON:
//! - explain: plan a collection query
//! - aggregate: build an aggregation query

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{
    aggregate, aggregate_request, command_events, explain, explain_request, load_config, run,
    run_command,
};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{read_request, write_error, write_response};

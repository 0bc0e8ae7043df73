//! CLI argument definitions using clap
//!
//! Commands:
//! - qcore explain [--config <path>]
//! - qcore aggregate [--config <path>]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// qcore - query planner of the blockchain document store
#[derive(Parser, Debug)]
#[command(name = "qcore")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Plan a collection query read from stdin and print its text,
    /// parameters and fast/slow verdict
    Explain {
        /// Path to configuration file; defaults apply when omitted
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Build the aggregation query read from stdin and print its text,
    /// parameters and per-field helpers
    Aggregate {
        /// Path to configuration file; defaults apply when omitted
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

//! qcore CLI entry point
//!
//! Parses arguments and dispatches through `cli::run`; any error has
//! already been written as a JSON envelope, so main only sets the exit code.

use qcore::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

//! cli
//!
//! Command-line interface for cachelock.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Install the log subscriber
//! - Delegate to command handlers
//!
//! # Architecture
//!
//! The CLI layer is thin. Handlers resolve the target lock from flags and
//! configuration, then go through [`crate::session::LockCoordinator`] like
//! any library caller would.

pub mod args;
pub mod commands;

pub use args::Cli;

use std::io::IsTerminal;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use crate::diagnostics::Verbosity;

/// Run the CLI application and return the process exit code.
///
/// This is the main entry point called from `main.rs`.
pub fn run() -> Result<i32> {
    let cli = Cli::parse_args();
    init_tracing(Verbosity::from_flags(cli.quiet, cli.debug));
    commands::dispatch(cli.command)
}

/// Install the stderr log subscriber.
///
/// `RUST_LOG` wins when set; otherwise the level follows `--debug`/`--quiet`.
fn init_tracing(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.filter_directive()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .without_time()
        .try_init();
}

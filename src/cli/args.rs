//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Only report errors

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// cachelock - Advisory cross-process locks for shared cache directories
#[derive(Parser, Debug)]
#[command(name = "cachelock")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(long, global = true, conflicts_with = "quiet")]
    pub debug: bool,

    /// Only report errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Which lock a command operates on.
#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    /// Project root the lock directory lives under
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Working directory being protected [default: the root]
    #[arg(long)]
    pub dir: Option<PathBuf>,

    /// Lock id [default: configured default_id, or "nuxt"]
    #[arg(long)]
    pub id: Option<String>,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the lock path for a working directory
    Path {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Show whether a working directory is currently locked
    #[command(after_help = "\
EXIT STATUS:
    0    the probe succeeded (locked or unlocked)
    1    the probe failed")]
    Status {
        #[command(flatten)]
        target: TargetArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run a command while holding the lock
    #[command(
        long_about = "Run a command while holding the lock.\n\n\
            The lock is advisory: if it cannot be obtained a warning is printed \
            and the command runs anyway. The lock is released when the command \
            exits, and the exit status of the command is passed through.",
        after_help = "\
EXAMPLES:
    # Serialize builds that share a cache directory
    cachelock run --root . --dir .output -- npm run build"
    )]
    Run {
        #[command(flatten)]
        target: TargetArgs,

        /// Command and arguments to run
        #[arg(last = true, required = true, value_name = "COMMAND")]
        command: Vec<String>,
    },
}

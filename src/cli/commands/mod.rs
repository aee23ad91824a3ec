//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Resolves the target lock from flags and configuration
//! 2. Calls into the library (path derivation or a lock coordinator)
//! 3. Formats and displays output
//!
//! # Async Commands
//!
//! `status` and `run` talk to the lock primitive, which is async. They build
//! a tokio runtime and block on it, keeping dispatch synchronous.

mod path;
mod run_cmd;
mod status;

pub use path::path;
pub use run_cmd::run;
pub use status::status;

use std::path::{Component, Path, PathBuf};

use anyhow::{bail, Context as _, Result};

use super::args::{Command, TargetArgs};
use crate::core::config::Config;
use crate::core::types::LockIdentity;

/// Dispatch a parsed command and return the process exit code.
pub fn dispatch(command: Command) -> Result<i32> {
    match command {
        Command::Path { target } => path(&target).map(|()| 0),
        Command::Status { target, json } => status(&target, json),
        Command::Run { target, command } => run(&target, &command),
    }
}

/// A lock target resolved from flags and configuration.
#[derive(Debug, Clone)]
pub struct Target {
    pub identity: LockIdentity,
    pub config: Config,
}

/// Resolve `--root`, `--dir` and `--id` into a [`Target`].
///
/// Relative paths are taken against the current directory. `--dir`
/// defaults to the root and `--id` to the configured default id.
pub fn resolve_target(args: &TargetArgs) -> Result<Target> {
    let cwd = std::env::current_dir().context("Failed to determine current directory")?;
    let root = absolutize(&cwd, &args.root);
    let dir = match args.dir {
        Some(ref dir) => absolutize(&cwd, dir),
        None => root.clone(),
    };

    let config = Config::load(Some(&root)).context("Failed to load configuration")?;
    if let Some(path) = config.project_config_loaded_from() {
        tracing::debug!(path = %path.display(), "loaded project config");
    }

    let id = match args.id {
        Some(ref id) => id.clone(),
        None => config.default_id(),
    };
    if id.is_empty() || id.contains(['/', '\\']) {
        bail!("Invalid lock id '{}': must be non-empty without path separators", id);
    }

    Ok(Target {
        identity: LockIdentity::new(dir, root).with_id(id),
        config,
    })
}

/// Join `path` onto `base` unless absolute, dropping `.` and folding `..`.
fn absolutize(base: &Path, path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    normalized
}

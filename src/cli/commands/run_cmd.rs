//! run command - Run a command while holding the lock

use std::process::ExitStatus;

use anyhow::{Context as _, Result};

use super::{resolve_target, Target};
use crate::cli::args::TargetArgs;
use crate::session::{LockCoordinator, LockOptions};

/// Acquire the target lock, run `command`, release, and pass through the
/// command's exit code.
///
/// Locking is advisory: the command runs even when the lock is not obtained.
pub fn run(args: &TargetArgs, command: &[String]) -> Result<i32> {
    let target = resolve_target(args)?;
    let rt = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;
    rt.block_on(run_async(&target, command))
}

async fn run_async(target: &Target, command: &[String]) -> Result<i32> {
    let (program, program_args) = command.split_first().context("No command given")?;

    let coordinator = LockCoordinator::from_config(&target.config);
    let handle = coordinator
        .acquire_lock(&target.identity, LockOptions::new())
        .await;
    if let Some(ref handle) = handle {
        tracing::debug!(path = %handle.path(), "lock acquired");
    }

    let status = tokio::process::Command::new(program)
        .args(program_args)
        .status()
        .await;

    if let Some(handle) = handle {
        let outcome = handle.release().await;
        tracing::debug!(?outcome, "lock released");
    }

    let status = status.with_context(|| format!("Failed to run '{}'", program))?;
    Ok(exit_code(status))
}

/// Exit code for a finished child, using the shell's `128 + signal` convention.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    1
}

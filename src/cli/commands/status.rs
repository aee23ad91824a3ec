//! status command - Show whether a working directory is locked
//!
//! Probes the lock primitive without acquiring anything. The lock path is
//! not created.

use std::path::Path;

use anyhow::{Context as _, Result};
use serde::Serialize;

use super::resolve_target;
use crate::cli::args::TargetArgs;
use crate::session::{LockCoordinator, ProbeStatus};

#[derive(Debug, Serialize)]
struct StatusReport<'a> {
    id: &'a str,
    root: &'a Path,
    working_dir: &'a Path,
    lock_path: &'a Path,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'a str>,
}

/// Probe the target lock and print the result.
///
/// Returns exit code 1 if the probe itself failed.
pub fn status(args: &TargetArgs, json: bool) -> Result<i32> {
    let target = resolve_target(args)?;
    let coordinator = LockCoordinator::from_config(&target.config);
    let lock_path = coordinator.lock_path(&target.identity);

    let rt = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;
    let probe = rt.block_on(coordinator.probe(&lock_path, coordinator.settings().stale));

    let reason = match probe {
        ProbeStatus::Unknown(ref reason) => Some(reason.as_str()),
        _ => None,
    };

    if json {
        let report = StatusReport {
            id: &target.identity.id,
            root: &target.identity.root,
            working_dir: &target.identity.working_dir,
            lock_path: lock_path.as_path(),
            status: probe.as_str(),
            reason,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Lock: {}", target.identity);
        println!("Path: {}", lock_path);
        println!("Status: {}", probe);
        if let Some(reason) = reason {
            println!("Reason: {}", reason);
        }
    }

    Ok(match probe {
        ProbeStatus::Unknown(_) => 1,
        ProbeStatus::Locked | ProbeStatus::Unlocked => 0,
    })
}

//! core::fs
//!
//! Directory helpers used by the lock session and the exit sweep.
//!
//! # Invariants
//!
//! - Creating an existing directory is not an error
//! - Removing a missing path is not an error
//! - `remove_dir_sync` never blocks on an async runtime, so it is safe to
//!   call from an exit hook

use std::io;
use std::path::Path;

/// Create `path` and any missing parents.
pub async fn ensure_dir(path: &Path) -> io::Result<()> {
    tokio::fs::create_dir_all(path).await
}

/// Remove a directory tree. Missing paths are ignored.
pub async fn remove_dir(path: &Path) -> io::Result<()> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Whether anything exists at `path`.
///
/// Errors while probing (e.g. permission denied on a parent) count as
/// "does not exist".
pub async fn path_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

/// Blocking variant of [`remove_dir`].
pub fn remove_dir_sync(path: &Path) -> io::Result<()> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

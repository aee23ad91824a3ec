//! lockfile
//!
//! Low-level advisory lock primitive.
//!
//! # Architecture
//!
//! A lock on `path` is the directory `{path}.lock`. Directory creation is
//! atomic on every filesystem we care about, so whoever creates it owns the
//! lock. While held, the owner bumps the directory's mtime every `update`
//! interval; a lock whose mtime is older than `stale` is considered abandoned
//! and may be reclaimed by another process.
//!
//! If the owner notices that it can no longer vouch for the lock (the
//! directory vanished, someone else's mtime is on it, or refreshing fell
//! behind the stale threshold) the lock is *compromised*: it is marked
//! released and the `on_compromised` handler is invoked from the refresh
//! task. A later [`HeldLock::release`] then fails with
//! [`LockfileError::AlreadyReleased`].
//!
//! # Modules
//!
//! - [`mkdir`] - The shipped implementation, [`MkdirLock`]
//! - [`mock`] - Scriptable implementation for tests
//!
//! # Example
//!
//! ```no_run
//! use cachelock::lockfile::{AcquireOptions, FileLock, LockfileError, MkdirLock};
//! use std::path::Path;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let primitive = MkdirLock::new();
//! let options = AcquireOptions::new(Duration::from_secs(30), Arc::new(|err: &LockfileError| {
//!     eprintln!("lost the lock: {err}");
//! }));
//!
//! let held = primitive.acquire(Path::new("/tmp/cache-lock"), options).await?;
//! // ... exclusive work ...
//! held.release().await?;
//! # Ok::<(), cachelock::lockfile::LockfileError>(())
//! # });
//! ```

pub mod mkdir;
pub mod mock;

pub use mkdir::MkdirLock;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Smallest accepted stale threshold.
pub const MIN_STALE: Duration = Duration::from_secs(2);

/// Smallest accepted refresh interval.
pub const MIN_UPDATE: Duration = Duration::from_secs(1);

/// Errors from the lock primitive.
#[derive(Debug, Error)]
pub enum LockfileError {
    /// Another live holder owns the lock.
    #[error("lock on {} is already held by another process", .path.display())]
    AlreadyLocked { path: PathBuf },

    /// The lock was already released, either explicitly or by compromise.
    #[error("lock on {} is already released", .path.display())]
    AlreadyReleased { path: PathBuf },

    /// Ownership was lost while held.
    #[error("lock on {} was compromised: {reason}", .path.display())]
    Compromised { path: PathBuf, reason: String },

    /// Filesystem error while operating on the lock.
    #[error("lock i/o error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl LockfileError {
    /// Whether this error means the lock was already released.
    pub fn is_already_released(&self) -> bool {
        matches!(self, LockfileError::AlreadyReleased { .. })
    }

    /// Whether this error means another holder owns the lock.
    pub fn is_already_locked(&self) -> bool {
        matches!(self, LockfileError::AlreadyLocked { .. })
    }

    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        LockfileError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Callback invoked when a held lock is compromised.
///
/// Runs on the primitive's refresh task, never inside `acquire`.
pub type CompromiseHandler = Arc<dyn Fn(&LockfileError) + Send + Sync>;

/// Options for [`FileLock::acquire`].
#[derive(Clone)]
pub struct AcquireOptions {
    /// Age after which an unrefreshed lock may be reclaimed.
    pub stale: Duration,
    /// Refresh interval; `None` means half of `stale`.
    pub update: Option<Duration>,
    /// Called once if the lock is compromised while held.
    pub on_compromised: CompromiseHandler,
}

impl AcquireOptions {
    /// Options with the default refresh interval.
    pub fn new(stale: Duration, on_compromised: CompromiseHandler) -> Self {
        Self {
            stale,
            update: None,
            on_compromised,
        }
    }

    /// Stale threshold clamped to [`MIN_STALE`].
    pub fn effective_stale(&self) -> Duration {
        self.stale.max(MIN_STALE)
    }

    /// Refresh interval clamped to `[MIN_UPDATE, stale / 2]`.
    pub fn effective_update(&self) -> Duration {
        let half = self.effective_stale() / 2;
        self.update.unwrap_or(half).min(half).max(MIN_UPDATE)
    }
}

impl std::fmt::Debug for AcquireOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcquireOptions")
            .field("stale", &self.stale)
            .field("update", &self.update)
            .finish_non_exhaustive()
    }
}

/// A lock currently held by this process.
#[async_trait]
pub trait HeldLock: Send + Sync {
    /// Release the lock.
    ///
    /// # Errors
    ///
    /// - [`LockfileError::AlreadyReleased`] if it was compromised meanwhile
    /// - [`LockfileError::Io`] if the lock artifact cannot be removed
    async fn release(self: Box<Self>) -> Result<(), LockfileError>;
}

/// Advisory lock primitive.
#[async_trait]
pub trait FileLock: Send + Sync {
    /// Whether `path` is currently locked by a live (non-stale) holder.
    ///
    /// Best-effort: I/O trouble is reported as an error, not as "unlocked".
    async fn check(&self, path: &Path, stale: Duration) -> Result<bool, LockfileError>;

    /// Try to take the lock on `path` without waiting.
    ///
    /// # Errors
    ///
    /// - [`LockfileError::AlreadyLocked`] if a live holder exists
    /// - [`LockfileError::Io`] for filesystem failures
    async fn acquire(
        &self,
        path: &Path,
        options: AcquireOptions,
    ) -> Result<Box<dyn HeldLock>, LockfileError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> CompromiseHandler {
        Arc::new(|_: &LockfileError| {})
    }

    #[test]
    fn stale_clamped_to_minimum() {
        let options = AcquireOptions::new(Duration::from_millis(10), noop());
        assert_eq!(options.effective_stale(), MIN_STALE);
    }

    #[test]
    fn update_defaults_to_half_stale() {
        let options = AcquireOptions::new(Duration::from_secs(30), noop());
        assert_eq!(options.effective_update(), Duration::from_secs(15));
    }

    #[test]
    fn update_clamped_to_range() {
        let mut options = AcquireOptions::new(Duration::from_secs(10), noop());

        options.update = Some(Duration::from_secs(60));
        assert_eq!(options.effective_update(), Duration::from_secs(5));

        options.update = Some(Duration::from_millis(10));
        assert_eq!(options.effective_update(), MIN_UPDATE);
    }

    #[test]
    fn error_predicates() {
        let path = PathBuf::from("/tmp/x");
        assert!(LockfileError::AlreadyReleased { path: path.clone() }.is_already_released());
        assert!(LockfileError::AlreadyLocked { path: path.clone() }.is_already_locked());
        assert!(!LockfileError::AlreadyLocked { path }.is_already_released());
    }

    #[test]
    fn error_display_formatting() {
        let path = PathBuf::from("/tmp/x");

        let err = LockfileError::AlreadyLocked { path: path.clone() };
        assert!(err.to_string().contains("already held"));

        let err = LockfileError::AlreadyReleased { path: path.clone() };
        assert!(err.to_string().contains("already released"));

        let err = LockfileError::Compromised {
            path: path.clone(),
            reason: "mtime changed".into(),
        };
        assert!(err.to_string().contains("compromised"));
        assert!(err.to_string().contains("mtime changed"));

        let err = LockfileError::io(&path, std::io::Error::other("boom"));
        assert!(err.to_string().contains("/tmp/x"));
    }

    #[test]
    fn options_debug_omits_handler() {
        let options = AcquireOptions::new(Duration::from_secs(30), noop());
        let debug = format!("{:?}", options);
        assert!(debug.contains("stale"));
    }
}

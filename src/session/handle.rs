//! session::handle
//!
//! Release handle for an acquired lock.

use std::sync::Arc;

use tokio::sync::{watch, Mutex};

use crate::core::fs;
use crate::core::types::LockPath;
use crate::diagnostics::DiagnosticSink;
use crate::lockfile::HeldLock;
use crate::registry::LockRegistry;

/// What [`LockHandle::release`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// The lock was released normally.
    Released,
    /// An earlier call already released this handle. Nothing was touched.
    AlreadyReleased,
    /// The lock had been compromised; leftover artifacts were cleaned up.
    RecoveredCompromised,
    /// The lock path could not be removed, or the primitive failed to
    /// release. Reported at debug level.
    Failed(String),
}

impl ReleaseOutcome {
    /// Whether this call released the lock (normally or after compromise).
    pub fn is_released(&self) -> bool {
        matches!(
            self,
            ReleaseOutcome::Released | ReleaseOutcome::RecoveredCompromised
        )
    }
}

/// A lock held by this process.
///
/// Returned by [`super::LockCoordinator::acquire_lock`]. Call
/// [`release`](Self::release) when the exclusive work is done. A handle that
/// is dropped without releasing stops refreshing and leaves cleanup to the
/// stale threshold and the exit sweep.
pub struct LockHandle {
    lock_path: LockPath,
    held: Mutex<Option<Box<dyn HeldLock>>>,
    compromised: watch::Receiver<bool>,
    registry: Arc<LockRegistry>,
    sink: Arc<dyn DiagnosticSink>,
}

impl LockHandle {
    pub(crate) fn new(
        lock_path: LockPath,
        held: Box<dyn HeldLock>,
        compromised: watch::Receiver<bool>,
        registry: Arc<LockRegistry>,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Self {
        Self {
            lock_path,
            held: Mutex::new(Some(held)),
            compromised,
            registry,
            sink,
        }
    }

    /// The lock path this handle holds.
    pub fn path(&self) -> &LockPath {
        &self.lock_path
    }

    /// Whether the lock was compromised while held.
    pub fn is_compromised(&self) -> bool {
        *self.compromised.borrow()
    }

    /// Receiver that flips to `true` when the lock is compromised.
    pub fn compromised(&self) -> watch::Receiver<bool> {
        self.compromised.clone()
    }

    /// Release the lock. Never fails; repeated calls are no-ops.
    ///
    /// Removes the lock path, forgets it in the registry, then releases the
    /// primitive lock. If the path cannot be removed the handle keeps the
    /// lock and its registry entry, so a later `release` or the exit sweep
    /// can still clean up. If the lock was compromised and the primitive
    /// reports it already released, the primitive's leftover artifact is
    /// removed.
    pub async fn release(&self) -> ReleaseOutcome {
        let mut slot = self.held.lock().await;
        let Some(held) = slot.take() else {
            return ReleaseOutcome::AlreadyReleased;
        };

        let path = self.lock_path.as_path();
        if let Err(err) = fs::remove_dir(path).await {
            self.sink
                .debug(&format!("Failed to remove lock path {}", self.lock_path), Some(&err));
            *slot = Some(held);
            return ReleaseOutcome::Failed(format!("failed to remove {}: {}", self.lock_path, err));
        }
        self.registry.unregister(path);

        let err = match held.release().await {
            Ok(()) => return ReleaseOutcome::Released,
            Err(err) => err,
        };

        if !self.is_compromised() || !err.is_already_released() {
            self.sink.debug("Failed to release lock", Some(&err));
            return ReleaseOutcome::Failed(err.to_string());
        }

        let artifact = self.lock_path.lock_dir();
        if fs::path_exists(&artifact).await {
            if let Err(err) = fs::remove_dir(&artifact).await {
                self.sink.debug(
                    &format!("Failed to remove {}", artifact.display()),
                    Some(&err),
                );
            }
        }
        ReleaseOutcome::RecoveredCompromised
    }
}

impl std::fmt::Debug for LockHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockHandle")
            .field("lock_path", &self.lock_path)
            .field("compromised", &self.is_compromised())
            .finish_non_exhaustive()
    }
}

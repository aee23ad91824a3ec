//! lockfile::mock
//!
//! Mock lock primitive for deterministic testing.
//!
//! # Design
//!
//! The mock keeps lock state in memory instead of on disk, records every
//! call, and can be told to fail a given operation. Tests drive compromise
//! explicitly with [`MockFileLock::compromise`], which invokes the stored
//! handler just as the real refresh task would.
//!
//! # Example
//!
//! ```
//! use cachelock::lockfile::mock::MockFileLock;
//! use cachelock::lockfile::{AcquireOptions, FileLock, LockfileError};
//! use std::path::Path;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let primitive = MockFileLock::new();
//! let options = AcquireOptions::new(Duration::from_secs(30), Arc::new(|_: &LockfileError| {}));
//!
//! let held = primitive.acquire(Path::new("/lock"), options).await.unwrap();
//! assert!(primitive.is_held(Path::new("/lock")));
//!
//! held.release().await.unwrap();
//! assert!(!primitive.is_held(Path::new("/lock")));
//! # });
//! ```

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use super::{AcquireOptions, CompromiseHandler, FileLock, HeldLock, LockfileError};

/// Mock lock primitive for testing.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping; clones share state.
#[derive(Clone, Default)]
pub struct MockFileLock {
    inner: Arc<Mutex<MockInner>>,
}

#[derive(Default)]
struct MockInner {
    /// Held locks and their compromise handlers.
    held: HashMap<PathBuf, CompromiseHandler>,
    /// Operation to fail (for testing error paths).
    fail_on: Option<FailOn>,
    /// Recorded operations for verification.
    operations: Vec<MockOperation>,
}

/// Which operation should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOn {
    /// `check` returns an I/O error.
    Check,
    /// `acquire` returns an I/O error.
    Acquire,
    /// `HeldLock::release` returns an I/O error.
    Release,
}

/// Recorded operation for test verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOperation {
    Check { path: PathBuf, stale: Duration },
    Acquire { path: PathBuf, stale: Duration },
    Release { path: PathBuf },
    Compromise { path: PathBuf },
}

impl MockFileLock {
    /// Create a mock with no locks held.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock that fails the given operation.
    pub fn failing(fail_on: FailOn) -> Self {
        let mock = Self::new();
        mock.set_fail_on(Some(fail_on));
        mock
    }

    /// Change which operation fails.
    pub fn set_fail_on(&self, fail_on: Option<FailOn>) {
        self.lock().fail_on = fail_on;
    }

    /// Whether `path` is currently held.
    pub fn is_held(&self, path: &Path) -> bool {
        self.lock().held.contains_key(path)
    }

    /// All operations recorded so far.
    pub fn operations(&self) -> Vec<MockOperation> {
        self.lock().operations.clone()
    }

    /// Compromise a held lock: drop it and invoke its handler.
    ///
    /// Returns false if `path` was not held.
    pub fn compromise(&self, path: &Path, reason: &str) -> bool {
        let handler = {
            let mut inner = self.lock();
            inner.operations.push(MockOperation::Compromise {
                path: path.to_path_buf(),
            });
            inner.held.remove(path)
        };

        match handler {
            Some(handler) => {
                handler(&LockfileError::Compromised {
                    path: path.to_path_buf(),
                    reason: reason.to_string(),
                });
                true
            }
            None => false,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for MockFileLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("MockFileLock")
            .field("held", &inner.held.keys().collect::<Vec<_>>())
            .field("fail_on", &inner.fail_on)
            .field("operations", &inner.operations)
            .finish()
    }
}

fn simulated(path: &Path, operation: &str) -> LockfileError {
    LockfileError::io(path, io::Error::other(format!("simulated {} failure", operation)))
}

#[async_trait]
impl FileLock for MockFileLock {
    async fn check(&self, path: &Path, stale: Duration) -> Result<bool, LockfileError> {
        let mut inner = self.lock();
        inner.operations.push(MockOperation::Check {
            path: path.to_path_buf(),
            stale,
        });
        if inner.fail_on == Some(FailOn::Check) {
            return Err(simulated(path, "check"));
        }
        Ok(inner.held.contains_key(path))
    }

    async fn acquire(
        &self,
        path: &Path,
        options: AcquireOptions,
    ) -> Result<Box<dyn HeldLock>, LockfileError> {
        let mut inner = self.lock();
        inner.operations.push(MockOperation::Acquire {
            path: path.to_path_buf(),
            stale: options.stale,
        });
        if inner.fail_on == Some(FailOn::Acquire) {
            return Err(simulated(path, "acquire"));
        }
        if inner.held.contains_key(path) {
            return Err(LockfileError::AlreadyLocked {
                path: path.to_path_buf(),
            });
        }
        inner
            .held
            .insert(path.to_path_buf(), options.on_compromised);

        Ok(Box::new(MockHeldLock {
            path: path.to_path_buf(),
            inner: Arc::clone(&self.inner),
        }))
    }
}

/// A lock held through [`MockFileLock`].
struct MockHeldLock {
    path: PathBuf,
    inner: Arc<Mutex<MockInner>>,
}

#[async_trait]
impl HeldLock for MockHeldLock {
    async fn release(self: Box<Self>) -> Result<(), LockfileError> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.operations.push(MockOperation::Release {
            path: self.path.clone(),
        });
        if inner.fail_on == Some(FailOn::Release) {
            return Err(simulated(&self.path, "release"));
        }
        match inner.held.remove(&self.path) {
            Some(_) => Ok(()),
            None => Err(LockfileError::AlreadyReleased {
                path: self.path.clone(),
            }),
        }
    }
}

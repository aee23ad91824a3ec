//! registry
//!
//! Process-wide record of held lock paths, swept on exit.
//!
//! # Architecture
//!
//! Every lock path this process holds is recorded here between a successful
//! acquisition and its release. If the process ends without releasing, the
//! exit sweep removes whatever is still recorded, so a crashed or killed
//! build never leaves its lock directories behind.
//!
//! The sweep also removes each path's `{path}.lock` sibling, the artifact
//! of the lock primitive. It is a last-resort safety net; the primary
//! cleanup path is [`crate::session::LockHandle::release`].
//!
//! # Invariants
//!
//! - The exit callback is installed at most once per registry, on the
//!   first registration into an empty registry
//! - A registry that never registers a path never touches its exit hook
//! - Set semantics: registering a path twice is a no-op
//!
//! # Example
//!
//! ```
//! use cachelock::registry::{LockRegistry, ManualExitHook};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let hook = Arc::new(ManualExitHook::new());
//! let registry = LockRegistry::new(hook.clone());
//! assert!(!registry.hook_installed());
//!
//! registry.register(Path::new("/tmp/never-created-lock"));
//! assert!(registry.hook_installed());
//! assert_eq!(hook.registrations(), 1);
//!
//! hook.fire();
//! assert!(registry.is_empty());
//! ```

pub mod exit;

pub use exit::{signal_listener_active, ExitCallback, ExitHook, ManualExitHook, ProcessExitHook};

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, Once, OnceLock, PoisonError};

use crate::core::fs;
use crate::core::types::lock_dir_for;

type PathSet = Arc<Mutex<BTreeSet<PathBuf>>>;

/// Set of lock paths held by this process.
pub struct LockRegistry {
    paths: PathSet,
    hook: Arc<dyn ExitHook>,
    install: Once,
}

impl LockRegistry {
    /// Create an isolated registry that reports to `hook`.
    pub fn new(hook: Arc<dyn ExitHook>) -> Self {
        Self {
            paths: Arc::default(),
            hook,
            install: Once::new(),
        }
    }

    /// The process-wide registry, wired to [`ProcessExitHook`].
    ///
    /// Initialized on first use. The exit hook itself is only installed once
    /// a lock is actually registered.
    pub fn global() -> Arc<LockRegistry> {
        static GLOBAL: OnceLock<Arc<LockRegistry>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(LockRegistry::new(Arc::new(ProcessExitHook)))))
    }

    /// Record a held lock path. Returns false if it was already recorded.
    pub fn register(&self, path: &Path) -> bool {
        let (was_empty, inserted) = {
            let mut paths = lock(&self.paths);
            let was_empty = paths.is_empty();
            (was_empty, paths.insert(path.to_path_buf()))
        };

        if was_empty && inserted {
            self.install.call_once(|| {
                let paths = Arc::clone(&self.paths);
                self.hook.on_exit(Box::new(move || {
                    sweep_paths(&paths);
                }));
            });
        }
        inserted
    }

    /// Forget a lock path. Returns false if it was not recorded.
    pub fn unregister(&self, path: &Path) -> bool {
        lock(&self.paths).remove(path)
    }

    /// Whether `path` is recorded.
    pub fn contains(&self, path: &Path) -> bool {
        lock(&self.paths).contains(path)
    }

    /// Number of recorded paths.
    pub fn len(&self) -> usize {
        lock(&self.paths).len()
    }

    /// Whether no paths are recorded.
    pub fn is_empty(&self) -> bool {
        lock(&self.paths).is_empty()
    }

    /// Recorded paths, in order.
    pub fn paths(&self) -> Vec<PathBuf> {
        lock(&self.paths).iter().cloned().collect()
    }

    /// Whether the exit callback has been installed.
    pub fn hook_installed(&self) -> bool {
        self.install.is_completed()
    }

    /// Remove every recorded path and its `.lock` sibling from disk, and
    /// forget them.
    ///
    /// Errors are ignored. Returns the number of paths swept.
    pub fn sweep(&self) -> usize {
        sweep_paths(&self.paths)
    }
}

impl std::fmt::Debug for LockRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockRegistry")
            .field("paths", &self.paths())
            .field("hook_installed", &self.hook_installed())
            .finish_non_exhaustive()
    }
}

fn lock(paths: &PathSet) -> MutexGuard<'_, BTreeSet<PathBuf>> {
    paths.lock().unwrap_or_else(PoisonError::into_inner)
}

fn sweep_paths(paths: &PathSet) -> usize {
    let drained = std::mem::take(&mut *lock(paths));
    for path in &drained {
        let _ = fs::remove_dir_sync(path);
        let _ = fs::remove_dir_sync(&lock_dir_for(path));
    }
    drained.len()
}

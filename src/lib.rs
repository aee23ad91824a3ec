//! cachelock - Advisory cross-process locks for shared cache directories
//!
//! cachelock lets independent process invocations coordinate exclusive access
//! to a shared working directory (a build output, a cache, a temp dir) using
//! nothing but the filesystem. Stale locks left by crashed processes are
//! reclaimed, locks lost while held are detected, and lock artifacts are
//! swept from disk when the holding process exits.
//!
//! # Architecture
//!
//! - [`session`] - Check-then-acquire sessions and release handles
//! - [`registry`] - Process-wide record of held locks, swept on exit
//! - [`lockfile`] - The mkdir-based lock primitive
//! - [`core`] - Identities, path derivation, filesystem helpers, config
//! - [`diagnostics`] - Leveled reporting sinks
//! - [`cli`] - The `cachelock` command-line interface
//!
//! # Advisory Semantics
//!
//! Locking never stands in the caller's way. Every failure is reported and
//! surfaces as `None`; the caller proceeds without the lock:
//!
//! ```no_run
//! use cachelock::core::types::LockIdentity;
//! use cachelock::session::LockOptions;
//!
//! # tokio_test::block_on(async {
//! let identity = LockIdentity::new("/project/.output", "/project");
//! let lock = cachelock::acquire_lock(&identity, LockOptions::new()).await;
//!
//! // ... exclusive work, best effort ...
//!
//! if let Some(lock) = lock {
//!     lock.release().await;
//! }
//! # });
//! ```

pub mod cli;
pub mod core;
pub mod diagnostics;
pub mod lockfile;
pub mod registry;
pub mod session;

use crate::core::types::LockIdentity;
use crate::session::{LockCoordinator, LockHandle, LockOptions};

/// Acquire a lock through the process-wide coordinator.
///
/// Uses [`lockfile::MkdirLock`], [`diagnostics::TracingSink`] and
/// [`registry::LockRegistry::global`] with default settings. See
/// [`LockCoordinator::acquire_lock`].
pub async fn acquire_lock(identity: &LockIdentity, options: LockOptions) -> Option<LockHandle> {
    LockCoordinator::global().acquire_lock(identity, options).await
}

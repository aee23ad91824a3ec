//! session
//!
//! Check-then-acquire lock sessions.
//!
//! # Architecture
//!
//! [`LockCoordinator`] ties the pieces together: it derives the lock path
//! for an identity, probes the primitive, acquires with merged options and
//! records the result in the [`LockRegistry`]. Locking is advisory and never
//! blocks the caller's work: every failure is reported through the
//! [`DiagnosticSink`] and surfaces as `None`, after which the caller is
//! expected to carry on without the lock.
//!
//! A detected conflict is reported at fatal level, and acquisition is still
//! attempted afterwards. The probe is informational; the primitive decides.
//!
//! # Lifecycle
//!
//! ```text
//! Unacquired -> Probing -> Acquiring -> Held | Failed
//! Held -> Compromised            (from the primitive's refresh task)
//! Held | Compromised -> Released (terminal)
//! ```
//!
//! # Example
//!
//! ```no_run
//! use cachelock::core::types::LockIdentity;
//! use cachelock::session::{LockCoordinator, LockOptions};
//!
//! # tokio_test::block_on(async {
//! let coordinator = LockCoordinator::default();
//! let identity = LockIdentity::new("/project/.output", "/project");
//!
//! let handle = coordinator.acquire_lock(&identity, LockOptions::new()).await;
//! // ... build, with or without the lock ...
//! if let Some(handle) = handle {
//!     handle.release().await;
//! }
//! # });
//! ```

mod handle;
mod options;

pub use handle::{LockHandle, ReleaseOutcome};
pub use options::{LockOptions, LockSettings, DEFAULT_STALE};

use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::sync::watch;

use crate::core::config::Config;
use crate::core::paths;
use crate::core::types::{LockIdentity, LockPath};
use crate::diagnostics::{DiagnosticSink, TracingSink};
use crate::lockfile::{AcquireOptions, CompromiseHandler, FileLock, LockfileError, MkdirLock};
use crate::registry::LockRegistry;

/// Result of probing a lock path before acquisition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeStatus {
    /// No live holder.
    Unlocked,
    /// A live holder exists.
    Locked,
    /// The probe itself failed.
    Unknown(String),
}

impl ProbeStatus {
    /// Short lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeStatus::Unlocked => "unlocked",
            ProbeStatus::Locked => "locked",
            ProbeStatus::Unknown(_) => "unknown",
        }
    }
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Acquires and tracks advisory locks.
pub struct LockCoordinator {
    file_lock: Arc<dyn FileLock>,
    sink: Arc<dyn DiagnosticSink>,
    registry: Arc<LockRegistry>,
    settings: LockSettings,
}

impl LockCoordinator {
    /// Create a coordinator from its collaborators, with default settings.
    pub fn new(
        file_lock: Arc<dyn FileLock>,
        sink: Arc<dyn DiagnosticSink>,
        registry: Arc<LockRegistry>,
    ) -> Self {
        Self {
            file_lock,
            sink,
            registry,
            settings: LockSettings::default(),
        }
    }

    /// Replace the coordinator-wide defaults.
    pub fn with_settings(mut self, settings: LockSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Production coordinator with settings resolved from `config`.
    pub fn from_config(config: &Config) -> Self {
        Self::default().with_settings(config.settings())
    }

    /// The process-wide coordinator with default settings.
    pub fn global() -> &'static LockCoordinator {
        static GLOBAL: OnceLock<LockCoordinator> = OnceLock::new();
        GLOBAL.get_or_init(LockCoordinator::default)
    }

    /// Coordinator-wide defaults.
    pub fn settings(&self) -> &LockSettings {
        &self.settings
    }

    /// The registry acquisitions are recorded in.
    pub fn registry(&self) -> &Arc<LockRegistry> {
        &self.registry
    }

    /// Derive the lock path for `identity` under the configured cache dir.
    pub fn lock_path(&self, identity: &LockIdentity) -> LockPath {
        paths::lock_path_for(identity, &self.settings.cache_dir)
    }

    /// Ask the primitive whether `path` has a live holder.
    pub async fn probe(&self, path: &LockPath, stale: Duration) -> ProbeStatus {
        match self.file_lock.check(path.as_path(), stale).await {
            Ok(true) => ProbeStatus::Locked,
            Ok(false) => ProbeStatus::Unlocked,
            Err(err) => ProbeStatus::Unknown(err.to_string()),
        }
    }

    /// Try to take the lock for `identity`.
    ///
    /// Returns `None` if the lock could not be obtained; the reason has been
    /// reported as a warning and the caller should proceed without it.
    pub async fn acquire_lock(
        &self,
        identity: &LockIdentity,
        options: LockOptions,
    ) -> Option<LockHandle> {
        let lock_path = self.lock_path(identity);
        let unable = format!("Unable to get a lock with id {} (but will continue)", identity);

        if let Err(err) = paths::ensure_lock_path(&lock_path).await {
            self.sink.debug(
                &format!("Failed to create lock path {}", lock_path),
                Some(&err),
            );
            self.sink.warn(&unable);
            return None;
        }

        let resolved = options.resolve(&self.settings, &self.sink);

        match self.probe(&lock_path, resolved.stale).await {
            ProbeStatus::Unlocked => {}
            ProbeStatus::Locked => self.sink.fatal(&format!(
                "A lock with id '{}' already exists on {}",
                identity.id,
                identity.working_dir.display()
            )),
            ProbeStatus::Unknown(reason) => self
                .sink
                .debug(&format!("Failed to check lock on {}: {}", lock_path, reason), None),
        }

        let (compromised_tx, compromised_rx) = watch::channel(false);
        let caller = resolved.on_compromised;
        let on_compromised: CompromiseHandler = Arc::new(move |err: &LockfileError| {
            caller(err);
            compromised_tx.send_replace(true);
        });

        let acquire_options = AcquireOptions {
            stale: resolved.stale,
            update: resolved.update,
            on_compromised,
        };

        let held = match self
            .file_lock
            .acquire(lock_path.as_path(), acquire_options)
            .await
        {
            Ok(held) => held,
            Err(err) => {
                self.sink
                    .debug(&format!("Failed to acquire lock on {}", lock_path), Some(&err));
                self.sink.warn(&unable);
                return None;
            }
        };

        self.registry.register(lock_path.as_path());

        Some(LockHandle::new(
            lock_path,
            held,
            compromised_rx,
            Arc::clone(&self.registry),
            Arc::clone(&self.sink),
        ))
    }
}

impl Default for LockCoordinator {
    /// [`MkdirLock`], [`TracingSink`] and the global registry.
    fn default() -> Self {
        Self::new(
            Arc::new(MkdirLock::new()),
            Arc::new(TracingSink),
            LockRegistry::global(),
        )
    }
}

impl fmt::Debug for LockCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockCoordinator")
            .field("settings", &self.settings)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

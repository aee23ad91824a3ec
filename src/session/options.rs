//! session::options
//!
//! Session defaults and per-call overrides.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::core::paths::DEFAULT_CACHE_DIR;
use crate::diagnostics::DiagnosticSink;
use crate::lockfile::{CompromiseHandler, LockfileError};

/// Default stale threshold.
pub const DEFAULT_STALE: Duration = Duration::from_secs(30);

/// Coordinator-wide defaults, usually resolved from [`crate::core::config::Config`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockSettings {
    /// Age after which an unrefreshed lock is considered abandoned.
    pub stale: Duration,
    /// Refresh interval; `None` means half of `stale`.
    pub update: Option<Duration>,
    /// Lock directory location, relative to the project root.
    pub cache_dir: PathBuf,
}

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            stale: DEFAULT_STALE,
            update: None,
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
        }
    }
}

/// Per-call options for [`super::LockCoordinator::acquire_lock`].
///
/// Every field is optional. Values given here win over [`LockSettings`].
#[derive(Clone, Default)]
pub struct LockOptions {
    pub stale: Option<Duration>,
    pub update: Option<Duration>,
    /// Called if the lock is compromised while held. Defaults to a warning.
    pub on_compromised: Option<CompromiseHandler>,
}

impl LockOptions {
    /// Options that defer to the coordinator for everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the stale threshold.
    pub fn with_stale(mut self, stale: Duration) -> Self {
        self.stale = Some(stale);
        self
    }

    /// Override the refresh interval.
    pub fn with_update(mut self, update: Duration) -> Self {
        self.update = Some(update);
        self
    }

    /// Install a compromise handler.
    pub fn on_compromised<F>(mut self, handler: F) -> Self
    where
        F: Fn(&LockfileError) + Send + Sync + 'static,
    {
        self.on_compromised = Some(Arc::new(handler));
        self
    }

    /// Merge over `settings`, filling a missing handler with a sink warning.
    pub(crate) fn resolve(
        self,
        settings: &LockSettings,
        sink: &Arc<dyn DiagnosticSink>,
    ) -> ResolvedOptions {
        let on_compromised = self.on_compromised.unwrap_or_else(|| {
            let sink = Arc::clone(sink);
            let warn: CompromiseHandler =
                Arc::new(move |err: &LockfileError| sink.warn(&err.to_string()));
            warn
        });

        ResolvedOptions {
            stale: self.stale.unwrap_or(settings.stale),
            update: self.update.or(settings.update),
            on_compromised,
        }
    }
}

impl std::fmt::Debug for LockOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockOptions")
            .field("stale", &self.stale)
            .field("update", &self.update)
            .field("on_compromised", &self.on_compromised.is_some())
            .finish()
    }
}

/// Fully merged options.
pub(crate) struct ResolvedOptions {
    pub stale: Duration,
    pub update: Option<Duration>,
    pub on_compromised: CompromiseHandler,
}

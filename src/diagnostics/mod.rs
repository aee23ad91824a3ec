//! diagnostics
//!
//! Leveled reporting for the lock coordinator.
//!
//! # Design
//!
//! The coordinator never propagates lock failures to its caller; instead it
//! reports them through a [`DiagnosticSink`]. A `fatal` report is terminal
//! for the operator's workflow but must never abort the coordinator itself,
//! so every sink method returns nothing and cannot fail.
//!
//! - [`TracingSink`] forwards to `tracing` (production)
//! - [`MemorySink`] records reports in memory (tests)
//!
//! # Example
//!
//! ```
//! use cachelock::diagnostics::{DiagnosticSink, Level, MemorySink};
//!
//! let sink = MemorySink::new();
//! sink.warn("unable to get a lock");
//! assert_eq!(sink.count(Level::Warn), 1);
//! ```

use std::error::Error;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// Output verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Quiet mode - fatal reports only
    Quiet,
    /// Normal mode - warnings and above
    Normal,
    /// Debug mode - everything
    Debug,
}

impl Verbosity {
    /// Create verbosity from flags.
    pub fn from_flags(quiet: bool, debug: bool) -> Self {
        if quiet {
            Verbosity::Quiet
        } else if debug {
            Verbosity::Debug
        } else {
            Verbosity::Normal
        }
    }

    /// Default `tracing` filter directive for this verbosity.
    pub fn filter_directive(self) -> &'static str {
        match self {
            Verbosity::Quiet => "error",
            Verbosity::Normal => "warn",
            Verbosity::Debug => "debug",
        }
    }
}

/// Severity of a diagnostic report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Debug,
    Warn,
    Fatal,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Debug => write!(f, "debug"),
            Level::Warn => write!(f, "warn"),
            Level::Fatal => write!(f, "fatal"),
        }
    }
}

/// Leveled reporting sink.
///
/// Implementations must be thread-safe: compromise handlers report from the
/// lock primitive's refresh task.
pub trait DiagnosticSink: Send + Sync {
    /// Terminal report to the operator. Must not panic or exit.
    fn fatal(&self, message: &str);

    /// Non-fatal problem; the caller continues.
    fn warn(&self, message: &str);

    /// Detail useful when diagnosing, optionally with the underlying error.
    fn debug(&self, message: &str, error: Option<&(dyn Error + 'static)>);
}

/// Sink that forwards to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn fatal(&self, message: &str) {
        tracing::error!(fatal = true, "{}", message);
    }

    fn warn(&self, message: &str) {
        tracing::warn!("{}", message);
    }

    fn debug(&self, message: &str, error: Option<&(dyn Error + 'static)>) {
        match error {
            Some(error) => tracing::debug!(error = %error, "{}", message),
            None => tracing::debug!("{}", message),
        }
    }
}

/// A recorded diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub level: Level,
    pub message: String,
    /// Rendered underlying error, for debug reports that carried one.
    pub error: Option<String>,
}

/// Sink that records every report, for tests.
///
/// Clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<Diagnostic>>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// All reports so far, oldest first.
    pub fn records(&self) -> Vec<Diagnostic> {
        self.lock().clone()
    }

    /// Number of reports at `level`.
    pub fn count(&self, level: Level) -> usize {
        self.lock().iter().filter(|d| d.level == level).count()
    }

    /// Whether any report at `level` mentions `needle` in its message or
    /// attached error.
    pub fn contains(&self, level: Level, needle: &str) -> bool {
        self.lock().iter().any(|d| {
            d.level == level
                && (d.message.contains(needle)
                    || d.error.as_deref().is_some_and(|e| e.contains(needle)))
        })
    }

    fn push(&self, level: Level, message: &str, error: Option<String>) {
        self.lock().push(Diagnostic {
            level,
            message: message.to_string(),
            error,
        });
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Diagnostic>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DiagnosticSink for MemorySink {
    fn fatal(&self, message: &str) {
        self.push(Level::Fatal, message, None);
    }

    fn warn(&self, message: &str) {
        self.push(Level::Warn, message, None);
    }

    fn debug(&self, message: &str, error: Option<&(dyn Error + 'static)>) {
        self.push(Level::Debug, message, error.map(|e| e.to_string()));
    }
}

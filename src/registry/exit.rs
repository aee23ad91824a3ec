//! registry::exit
//!
//! Process termination hooks.
//!
//! # Design
//!
//! [`ProcessExitHook`] runs registered callbacks synchronously when the
//! process ends:
//! - on normal exit (returning from `main` or `std::process::exit`), via
//!   `atexit`
//! - on SIGINT, SIGTERM and SIGHUP (Ctrl-C elsewhere), via a tokio signal
//!   listener that runs the callbacks and then exits with `128 + signo`
//!
//! The signal listener lives on its own `cachelock-signals` thread with a
//! current-thread runtime, so it outlasts whatever runtime the caller had
//! when the first callback was registered. Installation waits until the
//! handlers are in place. Callbacks are drained before they run, so a signal
//! that leads to `exit` does not run them a second time.
//!
//! [`ManualExitHook`] stores callbacks and runs them on demand, for tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Mutex, Once, PoisonError};
use std::thread;

/// Callback run at process termination.
pub type ExitCallback = Box<dyn Fn() + Send + Sync>;

/// Registers callbacks to run before the process terminates.
pub trait ExitHook: Send + Sync {
    /// Register `callback`. Independent registrations accumulate.
    fn on_exit(&self, callback: ExitCallback);
}

static CALLBACKS: Mutex<Vec<ExitCallback>> = Mutex::new(Vec::new());
static INSTALL: Once = Once::new();
static LISTENING: AtomicBool = AtomicBool::new(false);

/// The real process-wide exit hook.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessExitHook;

impl ExitHook for ProcessExitHook {
    fn on_exit(&self, callback: ExitCallback) {
        CALLBACKS
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(callback);
        INSTALL.call_once(install);
    }
}

fn install() {
    // SAFETY: `run_at_exit` is a plain `extern "C" fn` that captures nothing.
    // It runs the callbacks inside `catch_unwind`, so a panicking callback
    // never unwinds across the FFI boundary into libc.
    let rc = unsafe { libc::atexit(run_at_exit) };
    if rc != 0 {
        tracing::debug!("atexit registration failed; exit sweep limited to signals");
    }

    spawn_signal_listener();
}

/// Start the signal thread and wait until its handlers are registered.
fn spawn_signal_listener() {
    let (ready_tx, ready_rx) = mpsc::channel();
    let spawned = thread::Builder::new()
        .name("cachelock-signals".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    tracing::debug!(error = %e, "failed to build signal runtime; exit sweep limited to normal exit");
                    let _ = ready_tx.send(());
                    return;
                }
            };
            runtime.block_on(listen_for_signals(ready_tx));
        });

    match spawned {
        // A closed channel means the thread died early; nothing to wait for.
        Ok(_) => {
            let _ = ready_rx.recv();
        }
        Err(e) => {
            tracing::debug!(error = %e, "failed to spawn signal thread; exit sweep limited to normal exit");
        }
    }
}

/// Whether a signal listener is currently armed.
pub fn signal_listener_active() -> bool {
    LISTENING.load(Ordering::SeqCst)
}

/// Clears [`LISTENING`] when the listener stops for any reason.
struct Listening;

impl Listening {
    fn start() -> Self {
        LISTENING.store(true, Ordering::SeqCst);
        Listening
    }
}

impl Drop for Listening {
    fn drop(&mut self) {
        LISTENING.store(false, Ordering::SeqCst);
    }
}

extern "C" fn run_at_exit() {
    let _ = std::panic::catch_unwind(run_callbacks);
}

/// Drain and run every registered callback.
fn run_callbacks() {
    let callbacks = std::mem::take(&mut *CALLBACKS.lock().unwrap_or_else(PoisonError::into_inner));
    for callback in callbacks {
        callback();
    }
}

#[cfg(unix)]
async fn listen_for_signals(ready: mpsc::Sender<()>) {
    use tokio::signal::unix::{signal, SignalKind};

    let streams = (
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
        signal(SignalKind::hangup()),
    );
    let (mut sigint, mut sigterm, mut sighup) = match streams {
        (Ok(int), Ok(term), Ok(hup)) => (int, term, hup),
        _ => {
            tracing::debug!("failed to install signal handlers; exit sweep limited to normal exit");
            let _ = ready.send(());
            return;
        }
    };
    let _listening = Listening::start();
    let _ = ready.send(());

    let signo = tokio::select! {
        _ = sigint.recv() => libc::SIGINT,
        _ = sigterm.recv() => libc::SIGTERM,
        _ = sighup.recv() => libc::SIGHUP,
    };

    tracing::debug!(signal = signo, "termination signal received, running exit hooks");
    run_callbacks();
    std::process::exit(128 + signo);
}

#[cfg(not(unix))]
async fn listen_for_signals(ready: mpsc::Sender<()>) {
    let _listening = Listening::start();
    let _ = ready.send(());
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::debug!("failed to install Ctrl-C handler; exit sweep limited to normal exit");
        return;
    }

    tracing::debug!("Ctrl-C received, running exit hooks");
    run_callbacks();
    std::process::exit(130);
}

/// Exit hook that only runs when told to, for tests.
#[derive(Default)]
pub struct ManualExitHook {
    callbacks: Mutex<Vec<ExitCallback>>,
    registrations: Mutex<usize>,
}

impl ManualExitHook {
    /// Create a hook with no callbacks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `on_exit` calls so far.
    pub fn registrations(&self) -> usize {
        *self.registrations.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Simulate process termination: drain and run every callback.
    pub fn fire(&self) {
        let callbacks =
            std::mem::take(&mut *self.callbacks.lock().unwrap_or_else(PoisonError::into_inner));
        for callback in callbacks {
            callback();
        }
    }
}

impl ExitHook for ManualExitHook {
    fn on_exit(&self, callback: ExitCallback) {
        self.callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(callback);
        *self.registrations.lock().unwrap_or_else(PoisonError::into_inner) += 1;
    }
}

impl std::fmt::Debug for ManualExitHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualExitHook")
            .field("registrations", &self.registrations())
            .finish_non_exhaustive()
    }
}

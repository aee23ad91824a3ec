//! Integration tests for lock sessions over the real mkdir primitive.
//!
//! Each test builds isolated coordinators (own registry, manual exit hook,
//! memory sink) over a temp directory, so tests never touch the process-wide
//! registry or each other.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use filetime::FileTime;
use tempfile::TempDir;

use cachelock::core::types::{LockIdentity, LockPath};
use cachelock::diagnostics::{Level, MemorySink};
use cachelock::lockfile::MkdirLock;
use cachelock::registry::{LockRegistry, ManualExitHook};
use cachelock::session::{LockCoordinator, LockOptions, ReleaseOutcome};

// =============================================================================
// Test Fixtures
// =============================================================================

/// One simulated process: its own registry, exit hook and sink.
struct Process {
    sink: MemorySink,
    hook: Arc<ManualExitHook>,
    coordinator: LockCoordinator,
}

impl Process {
    fn new() -> Self {
        let sink = MemorySink::new();
        let hook = Arc::new(ManualExitHook::new());
        let registry = Arc::new(LockRegistry::new(hook.clone()));
        let coordinator =
            LockCoordinator::new(Arc::new(MkdirLock::new()), Arc::new(sink.clone()), registry);
        Self {
            sink,
            hook,
            coordinator,
        }
    }

    fn registry(&self) -> &LockRegistry {
        self.coordinator.registry()
    }
}

fn identity(temp: &TempDir) -> LockIdentity {
    LockIdentity::new(temp.path().join(".output"), temp.path())
}

fn short_stale() -> LockOptions {
    LockOptions::new()
        .with_stale(Duration::from_secs(2))
        .with_update(Duration::from_secs(1))
}

fn backdate(path: &Path, by: Duration) {
    let when = SystemTime::now() - by;
    filetime::set_file_mtime(path, FileTime::from_system_time(when)).expect("set mtime");
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn acquire_conflict_release_reacquire() {
    let temp = TempDir::new().expect("create temp dir");
    let id = identity(&temp);
    let a = Process::new();
    let b = Process::new();

    let held = a
        .coordinator
        .acquire_lock(&id, LockOptions::new())
        .await
        .expect("A acquires");
    let path: LockPath = held.path().clone();
    assert!(path.as_path().is_dir());
    assert!(path.lock_dir().is_dir());
    assert_eq!(a.registry().len(), 1);

    let contender = b.coordinator.acquire_lock(&id, LockOptions::new()).await;
    assert!(contender.is_none());
    assert_eq!(b.sink.count(Level::Fatal), 1);
    assert!(b.sink.contains(Level::Fatal, "A lock with id 'nuxt' already exists on"));
    assert!(b
        .sink
        .contains(Level::Warn, "Unable to get a lock with id 'nuxt' on"));
    assert!(b.registry().is_empty());

    assert_eq!(held.release().await, ReleaseOutcome::Released);
    assert!(!path.as_path().exists());
    assert!(!path.lock_dir().exists());
    assert!(a.registry().is_empty());

    let again = b
        .coordinator
        .acquire_lock(&id, LockOptions::new())
        .await
        .expect("B acquires after release");
    assert_eq!(again.release().await, ReleaseOutcome::Released);
}

#[tokio::test]
async fn concurrent_contenders_get_one_lock() {
    let temp = TempDir::new().expect("create temp dir");
    let id = identity(&temp);
    let processes: Vec<Arc<Process>> = (0..8).map(|_| Arc::new(Process::new())).collect();

    let mut tasks = Vec::new();
    for process in &processes {
        let process = Arc::clone(process);
        let id = id.clone();
        tasks.push(tokio::spawn(async move {
            process.coordinator.acquire_lock(&id, LockOptions::new()).await
        }));
    }

    let mut handles = Vec::new();
    for task in tasks {
        if let Some(handle) = task.await.expect("task completes") {
            handles.push(handle);
        }
    }

    assert_eq!(handles.len(), 1);
    for handle in handles {
        handle.release().await;
    }
}

#[tokio::test]
async fn release_twice_is_a_no_op() {
    let temp = TempDir::new().expect("create temp dir");
    let process = Process::new();

    let held = process
        .coordinator
        .acquire_lock(&identity(&temp), LockOptions::new())
        .await
        .expect("acquire");

    assert_eq!(held.release().await, ReleaseOutcome::Released);
    assert_eq!(held.release().await, ReleaseOutcome::AlreadyReleased);
    assert_eq!(process.sink.count(Level::Debug), 0);
}

#[tokio::test]
async fn stale_lock_from_crashed_holder_is_reclaimed() {
    let temp = TempDir::new().expect("create temp dir");
    let id = identity(&temp);
    let process = Process::new();

    // Leave an artifact behind as a crashed holder would.
    let path = process.coordinator.lock_path(&id);
    std::fs::create_dir_all(path.lock_dir()).expect("create stale artifact");
    backdate(&path.lock_dir(), Duration::from_secs(120));

    let held = process
        .coordinator
        .acquire_lock(&id, LockOptions::new())
        .await
        .expect("stale lock reclaimed");

    assert_eq!(process.sink.count(Level::Fatal), 0);
    assert_eq!(held.release().await, ReleaseOutcome::Released);
}

#[tokio::test]
async fn removed_artifact_compromises_the_session() {
    let temp = TempDir::new().expect("create temp dir");
    let process = Process::new();

    let held = process
        .coordinator
        .acquire_lock(&identity(&temp), short_stale())
        .await
        .expect("acquire");
    std::fs::remove_dir(held.path().lock_dir()).expect("remove artifact");

    let mut compromised = held.compromised();
    tokio::time::timeout(Duration::from_secs(10), compromised.wait_for(|c| *c))
        .await
        .expect("compromise detected in time")
        .expect("compromise signalled");

    assert!(held.is_compromised());
    assert!(process.sink.contains(Level::Warn, "compromised"));
    assert_eq!(held.release().await, ReleaseOutcome::RecoveredCompromised);
    assert!(!held.path().as_path().exists());
    assert!(process.registry().is_empty());
}

#[tokio::test]
async fn exit_sweep_removes_unreleased_locks() {
    let temp = TempDir::new().expect("create temp dir");
    let process = Process::new();

    let held = process
        .coordinator
        .acquire_lock(&identity(&temp), LockOptions::new())
        .await
        .expect("acquire");
    let path = held.path().clone();
    assert!(process.registry().hook_installed());
    assert_eq!(process.hook.registrations(), 1);

    process.hook.fire();

    assert!(!path.as_path().exists());
    assert!(!path.lock_dir().exists());
    assert!(process.registry().is_empty());
}

#[tokio::test]
async fn failed_acquire_keeps_the_ensured_dir() {
    let temp = TempDir::new().expect("create temp dir");
    let id = identity(&temp);
    let holder = Process::new();
    let contender = Process::new();

    let held = holder
        .coordinator
        .acquire_lock(&id, LockOptions::new())
        .await
        .expect("acquire");

    assert!(contender
        .coordinator
        .acquire_lock(&id, LockOptions::new())
        .await
        .is_none());
    assert!(held.path().as_path().is_dir());
    assert!(!contender.registry().hook_installed());

    held.release().await;
}

#[tokio::test]
async fn dropped_handle_goes_stale() {
    let temp = TempDir::new().expect("create temp dir");
    let id = identity(&temp);
    let a = Process::new();
    let b = Process::new();

    let held = a
        .coordinator
        .acquire_lock(&id, short_stale())
        .await
        .expect("acquire");
    let artifact = held.path().lock_dir();
    drop(held);

    // No refresh after drop; age the artifact past the threshold.
    backdate(&artifact, Duration::from_secs(10));

    let again = b
        .coordinator
        .acquire_lock(&id, short_stale())
        .await
        .expect("reacquire after holder went away");
    assert_eq!(b.sink.count(Level::Fatal), 0);
    again.release().await;
}

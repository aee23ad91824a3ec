//! lockfile::mkdir
//!
//! Directory-based lock primitive with mtime heartbeats.
//!
//! # Storage
//!
//! - `{path}.lock` - Lock directory; its mtime is the holder's heartbeat
//!
//! # Invariants
//!
//! - Acquisition is a single atomic `mkdir`, retried at most once after
//!   reclaiming a stale lock
//! - The holder records the mtime the filesystem reports after each refresh;
//!   any other mtime on the directory means someone else touched the lock
//! - The compromise handler fires at most once, from the refresh task
//! - Dropping a held lock stops its refresh task but leaves the directory;
//!   it then goes stale and can be reclaimed

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use filetime::FileTime;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::{AcquireOptions, CompromiseHandler, FileLock, HeldLock, LockfileError, MIN_STALE};
use crate::core::types::lock_dir_for;

/// Directory-based [`FileLock`].
///
/// # Example
///
/// ```no_run
/// use cachelock::lockfile::{FileLock, MkdirLock};
/// use std::path::Path;
/// use std::time::Duration;
///
/// # tokio_test::block_on(async {
/// let locked = MkdirLock::new()
///     .check(Path::new("/tmp/cache-lock"), Duration::from_secs(30))
///     .await?;
/// println!("locked: {locked}");
/// # Ok::<(), cachelock::lockfile::LockfileError>(())
/// # });
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct MkdirLock;

impl MkdirLock {
    /// Create the primitive.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FileLock for MkdirLock {
    async fn check(&self, path: &Path, stale: Duration) -> Result<bool, LockfileError> {
        let lock_dir = lock_dir_for(path);
        match read_mtime(&lock_dir).await {
            Ok(mtime) => Ok(age(mtime) <= stale.max(MIN_STALE)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(LockfileError::io(&lock_dir, e)),
        }
    }

    async fn acquire(
        &self,
        path: &Path,
        options: AcquireOptions,
    ) -> Result<Box<dyn HeldLock>, LockfileError> {
        let lock_dir = lock_dir_for(path);
        let stale = options.effective_stale();
        let mut reclaimed = false;

        loop {
            match tokio::fs::create_dir(&lock_dir).await {
                Ok(()) => break,
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists && !reclaimed => {
                    reclaimed = true;
                    match read_mtime(&lock_dir).await {
                        Ok(mtime) if age(mtime) <= stale => {
                            return Err(LockfileError::AlreadyLocked {
                                path: path.to_path_buf(),
                            });
                        }
                        Ok(_) => {
                            tracing::debug!(lock = %lock_dir.display(), "reclaiming stale lock");
                            remove_lock_dir(&lock_dir)
                                .await
                                .map_err(|e| LockfileError::io(&lock_dir, e))?;
                        }
                        // Released between our mkdir and stat; try once more.
                        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                        Err(e) => return Err(LockfileError::io(&lock_dir, e)),
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    return Err(LockfileError::AlreadyLocked {
                        path: path.to_path_buf(),
                    });
                }
                Err(e) => return Err(LockfileError::io(&lock_dir, e)),
            }
        }

        let mtime = read_mtime(&lock_dir)
            .await
            .map_err(|e| LockfileError::io(&lock_dir, e))?;

        let shared = Arc::new(Shared {
            path: path.to_path_buf(),
            lock_dir,
            state: Mutex::new(LockState {
                released: false,
                mtime,
                last_update: Instant::now(),
            }),
        });

        let refresher = tokio::spawn(refresh_loop(
            Arc::clone(&shared),
            options.effective_update(),
            stale,
            options.on_compromised,
        ));

        tracing::debug!(lock = %shared.lock_dir.display(), "lock acquired");
        Ok(Box::new(MkdirHeldLock { shared, refresher }))
    }
}

/// State shared between a held lock and its refresh task.
#[derive(Debug)]
struct Shared {
    path: PathBuf,
    lock_dir: PathBuf,
    state: Mutex<LockState>,
}

#[derive(Debug)]
struct LockState {
    released: bool,
    /// Last mtime we wrote (as reported back by the filesystem).
    mtime: FileTime,
    last_update: Instant,
}

impl Shared {
    fn state(&self) -> std::sync::MutexGuard<'_, LockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark released; returns false if it already was.
    fn mark_released(&self) -> bool {
        let mut state = self.state();
        !std::mem::replace(&mut state.released, true)
    }

    fn is_released(&self) -> bool {
        self.state().released
    }
}

/// A lock held through [`MkdirLock`].
#[derive(Debug)]
pub struct MkdirHeldLock {
    shared: Arc<Shared>,
    refresher: JoinHandle<()>,
}

#[async_trait]
impl HeldLock for MkdirHeldLock {
    async fn release(self: Box<Self>) -> Result<(), LockfileError> {
        if !self.shared.mark_released() {
            return Err(LockfileError::AlreadyReleased {
                path: self.shared.path.clone(),
            });
        }
        self.refresher.abort();

        remove_lock_dir(&self.shared.lock_dir)
            .await
            .map_err(|e| LockfileError::io(&self.shared.lock_dir, e))?;

        tracing::debug!(lock = %self.shared.lock_dir.display(), "lock released");
        Ok(())
    }
}

impl Drop for MkdirHeldLock {
    fn drop(&mut self) {
        self.refresher.abort();
    }
}

async fn refresh_loop(
    shared: Arc<Shared>,
    update: Duration,
    stale: Duration,
    on_compromised: CompromiseHandler,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + update, update);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if shared.is_released() {
            return;
        }

        let Err(reason) = refresh_once(&shared, stale).await else {
            continue;
        };

        // A concurrent release wins; nothing was lost.
        if !shared.mark_released() {
            return;
        }

        let err = LockfileError::Compromised {
            path: shared.path.clone(),
            reason,
        };
        tracing::debug!(lock = %shared.lock_dir.display(), error = %err, "lock compromised");
        on_compromised(&err);
        return;
    }
}

/// Bump the heartbeat. `Err` carries the reason the lock is compromised.
async fn refresh_once(shared: &Shared, stale: Duration) -> Result<(), String> {
    let (recorded, last_update) = {
        let state = shared.state();
        (state.mtime, state.last_update)
    };
    let over_threshold = || last_update.elapsed() > stale;

    if over_threshold() {
        return Err("unable to update lock within the stale threshold".to_string());
    }

    let current = match read_mtime(&shared.lock_dir).await {
        Ok(mtime) => mtime,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err("lock directory was removed".to_string());
        }
        Err(e) if over_threshold() => return Err(e.to_string()),
        Err(e) => {
            tracing::debug!(lock = %shared.lock_dir.display(), error = %e, "refresh failed, retrying");
            return Ok(());
        }
    };

    if current != recorded {
        return Err("lock mtime changed, another process took it over".to_string());
    }

    let lock_dir = shared.lock_dir.clone();
    let touched = tokio::task::spawn_blocking(move || {
        filetime::set_file_mtime(&lock_dir, FileTime::now())
    })
    .await
    .unwrap_or_else(|e| Err(io::Error::other(e)));

    match touched {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err("lock directory was removed".to_string());
        }
        Err(e) if over_threshold() => return Err(e.to_string()),
        Err(e) => {
            tracing::debug!(lock = %shared.lock_dir.display(), error = %e, "refresh failed, retrying");
            return Ok(());
        }
    }

    let refreshed = match read_mtime(&shared.lock_dir).await {
        Ok(mtime) => mtime,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err("lock directory was removed".to_string());
        }
        Err(e) => return Err(e.to_string()),
    };

    let mut state = shared.state();
    state.mtime = refreshed;
    state.last_update = Instant::now();
    Ok(())
}

async fn read_mtime(path: &Path) -> io::Result<FileTime> {
    let metadata = tokio::fs::metadata(path).await?;
    Ok(FileTime::from_last_modification_time(&metadata))
}

/// Time elapsed since `mtime`; zero if it lies in the future.
fn age(mtime: FileTime) -> Duration {
    let now = FileTime::now();
    let nanos = (now.unix_seconds() - mtime.unix_seconds()) as i128 * 1_000_000_000
        + (now.nanoseconds() as i128 - mtime.nanoseconds() as i128);
    if nanos <= 0 {
        Duration::ZERO
    } else {
        Duration::from_nanos(nanos.min(u64::MAX as i128) as u64)
    }
}

async fn remove_lock_dir(path: &Path) -> io::Result<()> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

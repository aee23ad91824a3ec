//! core::paths
//!
//! Deterministic lock path derivation.
//!
//! # Architecture
//!
//! Other processes locate a lock purely by recomputing its path, so the
//! derivation must be a pure function of `(id, working_dir, root)`: no pid,
//! no clock, no randomness. The root and working directory are folded into
//! a short SHA-256 digest so the directory name stays bounded regardless of
//! how deep the working directory is. The digest covers the raw bytes of
//! both paths, so paths that are not valid UTF-8 stay distinct.
//!
//! A relative root is resolved against the current directory first, so the
//! derived path is absolute and keeps naming the same directory if the
//! process later changes directory.
//!
//! # Storage Layout
//!
//! ```text
//! <root>/<cache_dir>/<id>-lock-<digest>       lock path (ensured before locking)
//! <root>/<cache_dir>/<id>-lock-<digest>.lock  primitive lock artifact
//! ```
//!
//! `cache_dir` defaults to [`DEFAULT_CACHE_DIR`].
//!
//! # Example
//!
//! ```
//! use cachelock::core::paths::derive_lock_path;
//! use std::path::Path;
//!
//! let a = derive_lock_path("nuxt", Path::new("/proj/app"), Path::new("/proj"));
//! let b = derive_lock_path("nuxt", Path::new("/proj/app"), Path::new("/proj"));
//! assert_eq!(a, b);
//! assert!(a.as_path().starts_with("/proj/node_modules/.cache/nuxt"));
//! ```

use std::io;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use super::fs;
use super::types::{LockIdentity, LockPath};

/// Cache directory, relative to the root, that holds lock paths.
pub const DEFAULT_CACHE_DIR: &str = "node_modules/.cache/nuxt";

/// Number of digest bytes kept in the directory name (16 hex chars).
const DIGEST_BYTES: usize = 8;

/// Stable short digest of a string.
///
/// # Example
///
/// ```
/// use cachelock::core::paths::digest;
///
/// assert_eq!(digest("abc"), digest("abc"));
/// assert_ne!(digest("abc"), digest("abd"));
/// assert_eq!(digest("abc").len(), 16);
/// ```
pub fn digest(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let hash = hasher.finalize();
    hex::encode(&hash[..DIGEST_BYTES])
}

/// Derive the lock path under the default cache directory.
pub fn derive_lock_path(id: &str, working_dir: &Path, root: &Path) -> LockPath {
    derive_lock_path_in(Path::new(DEFAULT_CACHE_DIR), id, working_dir, root)
}

/// Derive the lock path under `cache_dir` (relative to `root`).
///
/// The digest is taken over `root` as given; only the location is made
/// absolute.
pub fn derive_lock_path_in(cache_dir: &Path, id: &str, working_dir: &Path, root: &Path) -> LockPath {
    let sum = path_digest(root, working_dir);
    LockPath::new(absolute(root).join(cache_dir).join(format!("{}-lock-{}", id, sum)))
}

/// Digest of `{root}-{working_dir}` over the raw path bytes.
///
/// Equal to [`digest`] of the same string when both paths are UTF-8.
fn path_digest(root: &Path, working_dir: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(root.as_os_str().as_encoded_bytes());
    hasher.update(b"-");
    hasher.update(working_dir.as_os_str().as_encoded_bytes());
    let hash = hasher.finalize();
    hex::encode(&hash[..DIGEST_BYTES])
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Derive the lock path for an identity.
pub fn lock_path_for(identity: &LockIdentity, cache_dir: &Path) -> LockPath {
    derive_lock_path_in(cache_dir, &identity.id, &identity.working_dir, &identity.root)
}

/// Ensure the lock path exists as a directory.
///
/// The primitive creates `{path}.lock` next to it, so the parent chain must
/// exist first. Idempotent.
pub async fn ensure_lock_path(path: &LockPath) -> io::Result<()> {
    fs::ensure_dir(path.as_path()).await
}

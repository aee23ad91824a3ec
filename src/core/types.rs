//! core::types
//!
//! Strong types for lock identities and lock paths.
//!
//! # Design
//!
//! A [`LockIdentity`] is the semantic key of a lock: which lock domain (`id`)
//! guards which working directory under which project root. A [`LockPath`] is
//! the on-disk directory derived from it (see [`crate::core::paths`]).
//!
//! # Example
//!
//! ```
//! use cachelock::core::types::{LockIdentity, DEFAULT_LOCK_ID};
//!
//! let identity = LockIdentity::new("/proj/app", "/proj");
//! assert_eq!(identity.id, DEFAULT_LOCK_ID);
//!
//! let build = identity.clone().with_id("build");
//! assert_eq!(build.id, "build");
//! assert_eq!(build.working_dir, identity.working_dir);
//! ```

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

/// Lock domain used when the caller does not name one.
pub const DEFAULT_LOCK_ID: &str = "nuxt";

/// Suffix of the primitive's own lock artifact, a sibling of the lock path.
pub const LOCK_DIR_SUFFIX: &str = ".lock";

/// Identifies what is being locked.
///
/// `id` distinguishes independent lock domains that share the same
/// working directory (e.g. a build lock and a generate lock).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockIdentity {
    /// Lock domain name.
    pub id: String,
    /// Directory the lock guards.
    pub working_dir: PathBuf,
    /// Project root the lock path is derived under.
    pub root: PathBuf,
}

impl LockIdentity {
    /// Create an identity in the default lock domain.
    pub fn new(working_dir: impl Into<PathBuf>, root: impl Into<PathBuf>) -> Self {
        Self {
            id: DEFAULT_LOCK_ID.to_string(),
            working_dir: working_dir.into(),
            root: root.into(),
        }
    }

    /// Replace the lock domain.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

impl fmt::Display for LockIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' on {}", self.id, self.working_dir.display())
    }
}

/// A derived lock directory path.
///
/// The underlying primitive never locks this path itself; it creates the
/// sibling directory returned by [`LockPath::lock_dir`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LockPath(PathBuf);

impl LockPath {
    /// Wrap an already derived path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    /// The lock directory itself.
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// The primitive's lock artifact: `{path}.lock`.
    ///
    /// # Example
    ///
    /// ```
    /// use cachelock::core::types::LockPath;
    /// use std::path::PathBuf;
    ///
    /// let path = LockPath::new("/proj/.cache/nuxt-lock-abc");
    /// assert_eq!(path.lock_dir(), PathBuf::from("/proj/.cache/nuxt-lock-abc.lock"));
    /// ```
    pub fn lock_dir(&self) -> PathBuf {
        lock_dir_for(&self.0)
    }

    /// Consume into the inner path.
    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }
}

impl AsRef<Path> for LockPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for LockPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Sibling lock artifact for any path: `{path}.lock`.
pub fn lock_dir_for(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(LOCK_DIR_SUFFIX);
    PathBuf::from(name)
}

//! Property-based tests for lock path derivation.
//!
//! These tests use proptest to verify invariants hold across
//! randomly generated inputs.

use std::path::{Path, PathBuf};

use proptest::prelude::*;

use cachelock::core::paths::{derive_lock_path, derive_lock_path_in, digest, DEFAULT_CACHE_DIR};
use cachelock::core::types::{lock_dir_for, LockIdentity};

/// Strategy for lock ids: no path separators, never empty.
fn lock_id() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_.-]{1,20}".prop_filter("not a relative path component", |id| {
        id != "." && id != ".."
    })
}

/// Strategy for absolute directory paths.
fn abs_dir() -> impl Strategy<Value = PathBuf> {
    prop::collection::vec("[a-zA-Z0-9_-]{1,12}", 1..5).prop_map(|parts| {
        let mut path = PathBuf::from("/");
        for part in parts {
            path.push(part);
        }
        path
    })
}

proptest! {
    /// Same inputs always give the same path.
    #[test]
    fn derivation_is_deterministic(id in lock_id(), root in abs_dir(), dir in abs_dir()) {
        let first = derive_lock_path(&id, &dir, &root);
        let second = derive_lock_path(&id, &dir, &root);
        prop_assert_eq!(first, second);
    }

    /// The path is a direct child of `root/<cache dir>`.
    #[test]
    fn path_lives_under_cache_dir(id in lock_id(), root in abs_dir(), dir in abs_dir()) {
        let path = derive_lock_path(&id, &dir, &root);
        let expected_parent = root.join(DEFAULT_CACHE_DIR);
        prop_assert_eq!(path.as_path().parent(), Some(expected_parent.as_path()));
    }

    /// The file name is `{id}-lock-{16 hex chars}`.
    #[test]
    fn file_name_shape(id in lock_id(), root in abs_dir(), dir in abs_dir()) {
        let path = derive_lock_path(&id, &dir, &root);
        let name = path
            .as_path()
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .unwrap_or_default();

        let prefix = format!("{}-lock-", id);
        prop_assert!(name.starts_with(&prefix));
        let hash = &name[prefix.len()..];
        prop_assert_eq!(hash.len(), 16);
        prop_assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    /// Different working dirs under one root get different paths.
    #[test]
    fn distinct_dirs_distinct_paths(id in lock_id(), root in abs_dir(), a in abs_dir(), b in abs_dir()) {
        prop_assume!(a != b);
        prop_assert_ne!(derive_lock_path(&id, &a, &root), derive_lock_path(&id, &b, &root));
    }

    /// Different ids never share a path.
    #[test]
    fn distinct_ids_distinct_paths(a in lock_id(), b in lock_id(), root in abs_dir(), dir in abs_dir()) {
        prop_assume!(a != b);
        prop_assert_ne!(derive_lock_path(&a, &dir, &root), derive_lock_path(&b, &dir, &root));
    }

    /// The hash only depends on `"{root}-{dir}"`, not on the id or cache dir.
    #[test]
    fn hash_independent_of_id_and_cache_dir(id in lock_id(), root in abs_dir(), dir in abs_dir()) {
        let expected = digest(&format!("{}-{}", root.display(), dir.display()));
        let path = derive_lock_path_in(Path::new(".locks"), &id, &dir, &root);
        let name = path.as_path().file_name().and_then(|n| n.to_str()).map(str::to_string);
        prop_assert_eq!(name, Some(format!("{}-lock-{}", id, expected)));
    }

    /// The primitive's artifact is the `.lock` sibling.
    #[test]
    fn lock_dir_is_sibling(id in lock_id(), root in abs_dir(), dir in abs_dir()) {
        let path = derive_lock_path(&id, &dir, &root);
        let artifact = path.lock_dir();
        prop_assert_eq!(artifact.parent(), path.as_path().parent());
        prop_assert_eq!(artifact.clone(), lock_dir_for(path.as_path()));
        prop_assert!(artifact.to_string_lossy().ends_with(".lock"));
    }

    /// Identity-based derivation agrees with the free function.
    #[test]
    fn identity_matches_free_function(id in lock_id(), root in abs_dir(), dir in abs_dir()) {
        let identity = LockIdentity::new(&dir, &root).with_id(id.clone());
        let via_identity = cachelock::core::paths::lock_path_for(&identity, Path::new(DEFAULT_CACHE_DIR));
        prop_assert_eq!(via_identity, derive_lock_path(&id, &dir, &root));
    }
}

#[test]
fn digest_is_sha256_prefix() {
    // sha256("") = e3b0c44298fc1c14...
    assert_eq!(digest(""), "e3b0c44298fc1c14");
}

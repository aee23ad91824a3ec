//! core
//!
//! Core domain types, path derivation, filesystem helpers and configuration.
//!
//! # Modules
//!
//! - [`types`] - Strong types: LockIdentity, LockPath
//! - [`paths`] - Deterministic lock path derivation
//! - [`fs`] - Idempotent directory helpers
//! - [`config`] - Configuration schema and loading
//!
//! # Design Principles
//!
//! - Lock paths are pure functions of their identity
//! - Directory operations are idempotent
//! - Missing config files are never errors

pub mod config;
pub mod fs;
pub mod paths;
pub mod types;

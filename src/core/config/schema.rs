//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Config File
//!
//! The same schema is used for both scopes (global and project). Every key
//! is optional; unset keys fall through to the next scope and finally to the
//! built-in defaults.
//!
//! # Validation
//!
//! Values are validated after parsing so that a bad threshold is reported
//! at load time rather than surfacing as a lock that is reclaimed too early.

use std::path::{Component, PathBuf};

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::lockfile::{MIN_STALE, MIN_UPDATE};

/// Lock configuration file.
///
/// # Example
///
/// ```toml
/// default_id = "build"
/// cache_dir = "node_modules/.cache/app"
/// stale_ms = 60000
/// update_ms = 10000
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    /// Lock domain used when a caller does not name one
    pub default_id: Option<String>,

    /// Directory, relative to the project root, holding lock paths
    pub cache_dir: Option<PathBuf>,

    /// Milliseconds without a refresh after which a lock counts as stale
    pub stale_ms: Option<u64>,

    /// Milliseconds between refreshes of a held lock
    pub update_ms: Option<u64>,
}

impl ConfigFile {
    /// Validate the values present in this file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(id) = &self.default_id {
            if id.is_empty() {
                return Err(ConfigError::InvalidValue(
                    "default_id cannot be empty".to_string(),
                ));
            }
            if id.contains(['/', '\\']) {
                return Err(ConfigError::InvalidValue(format!(
                    "default_id '{}' must not contain path separators",
                    id
                )));
            }
        }

        if let Some(cache_dir) = &self.cache_dir {
            let relative = cache_dir
                .components()
                .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
            if cache_dir.as_os_str().is_empty() || !relative {
                return Err(ConfigError::InvalidValue(format!(
                    "cache_dir '{}' must be a relative path inside the project root",
                    cache_dir.display()
                )));
            }
        }

        if let Some(stale) = self.stale_ms {
            if stale < MIN_STALE.as_millis() as u64 {
                return Err(ConfigError::InvalidValue(format!(
                    "stale_ms must be at least {}, got {}",
                    MIN_STALE.as_millis(),
                    stale
                )));
            }
        }

        if let Some(update) = self.update_ms {
            if update < MIN_UPDATE.as_millis() as u64 {
                return Err(ConfigError::InvalidValue(format!(
                    "update_ms must be at least {}, got {}",
                    MIN_UPDATE.as_millis(),
                    update
                )));
            }
            if let Some(stale) = self.stale_ms {
                if update > stale / 2 {
                    return Err(ConfigError::InvalidValue(format!(
                        "update_ms ({}) must not exceed half of stale_ms ({})",
                        update, stale
                    )));
                }
            }
        }

        Ok(())
    }

    /// Overlay `self` on top of `base`: keys set here win.
    pub fn merged_over(&self, base: &ConfigFile) -> ConfigFile {
        ConfigFile {
            default_id: self.default_id.clone().or_else(|| base.default_id.clone()),
            cache_dir: self.cache_dir.clone().or_else(|| base.cache_dir.clone()),
            stale_ms: self.stale_ms.or(base.stale_ms),
            update_ms: self.update_ms.or(base.update_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ConfigFile::default();
        assert!(config.default_id.is_none());
        assert!(config.cache_dir.is_none());
        assert!(config.stale_ms.is_none());
        assert!(config.update_ms.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn valid_values() {
        let config = ConfigFile {
            default_id: Some("build".to_string()),
            cache_dir: Some(PathBuf::from("node_modules/.cache/app")),
            stale_ms: Some(60_000),
            update_ms: Some(10_000),
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_id_rejected() {
        let config = ConfigFile {
            default_id: Some(String::new()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn id_with_separator_rejected() {
        let config = ConfigFile {
            default_id: Some("a/b".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn absolute_cache_dir_rejected() {
        let config = ConfigFile {
            cache_dir: Some(PathBuf::from("/tmp/locks")),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn escaping_cache_dir_rejected() {
        let config = ConfigFile {
            cache_dir: Some(PathBuf::from("../outside")),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn stale_below_minimum_rejected() {
        let config = ConfigFile {
            stale_ms: Some(500),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn update_above_half_stale_rejected() {
        let config = ConfigFile {
            stale_ms: Some(10_000),
            update_ms: Some(6_000),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("update_ms"));
    }

    #[test]
    fn merged_over_prefers_overlay() {
        let base = ConfigFile {
            default_id: Some("global".to_string()),
            stale_ms: Some(30_000),
            ..Default::default()
        };
        let overlay = ConfigFile {
            default_id: Some("project".to_string()),
            update_ms: Some(5_000),
            ..Default::default()
        };

        let merged = overlay.merged_over(&base);
        assert_eq!(merged.default_id.as_deref(), Some("project"));
        assert_eq!(merged.stale_ms, Some(30_000));
        assert_eq!(merged.update_ms, Some(5_000));
        assert!(merged.cache_dir.is_none());
    }

    #[test]
    fn roundtrip() {
        let config = ConfigFile {
            default_id: Some("nuxt".to_string()),
            cache_dir: Some(PathBuf::from(".cache/locks")),
            stale_ms: Some(20_000),
            update_ms: Some(5_000),
        };

        let toml = toml::to_string_pretty(&config).unwrap();
        let parsed: ConfigFile = toml::from_str(&toml).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn reject_unknown_fields() {
        let toml = r#"
            default_id = "nuxt"
            unknown_field = true
        "#;

        let result: Result<ConfigFile, _> = toml::from_str(toml);
        assert!(result.is_err());
    }
}

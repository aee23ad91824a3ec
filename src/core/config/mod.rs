//! core::config
//!
//! Configuration schema and loading.
//!
//! # Overview
//!
//! cachelock has two configuration scopes:
//! - **Global**: User-level settings
//! - **Project**: Per-root overrides
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Global config file
//! 3. Project config file
//! 4. CLI flags and caller-supplied lock options (not handled here)
//!
//! # Global Config Locations
//!
//! Searched in order:
//! 1. `$CACHELOCK_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/cachelock/config.toml`
//! 3. `~/.cachelock/config.toml`
//!
//! # Project Config Location
//!
//! `<root>/cachelock.toml`
//!
//! # Example
//!
//! ```no_run
//! use cachelock::core::config::Config;
//! use std::path::Path;
//!
//! let config = Config::load(Some(Path::new("/path/to/project"))).unwrap();
//!
//! println!("Lock id: {}", config.default_id());
//! println!("Stale after: {:?}", config.settings().stale);
//! ```

pub mod schema;

pub use schema::ConfigFile;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::core::paths::DEFAULT_CACHE_DIR;
use crate::core::types::DEFAULT_LOCK_ID;
use crate::session::LockSettings;

/// Canonical project config file name.
pub const PROJECT_CONFIG_FILE: &str = "cachelock.toml";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),

    #[error("home directory not found")]
    NoHomeDir,
}

/// Merged configuration from all sources.
///
/// Accessor methods apply precedence rules automatically: project config
/// overrides global config, which overrides the built-in defaults.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Global configuration
    pub global: ConfigFile,
    /// Project configuration (if a root was given and a file exists)
    pub project: Option<ConfigFile>,
    /// Path to the global config file (if loaded)
    global_path: Option<PathBuf>,
    /// Path to the project config file (if loaded)
    project_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from default locations.
    ///
    /// If `root` is provided, also loads the project config under it.
    ///
    /// # Errors
    ///
    /// Returns an error if config files exist but cannot be parsed.
    /// Missing config files are not an error (defaults are used).
    pub fn load(root: Option<&Path>) -> Result<Config, ConfigError> {
        Self::load_with(Self::find_global(), root)
    }

    /// Load configuration with an explicit global config location.
    ///
    /// A `global_path` that does not exist is treated as absent.
    pub fn load_with(
        global_path: Option<PathBuf>,
        root: Option<&Path>,
    ) -> Result<Config, ConfigError> {
        let (global, global_path) = match global_path.filter(|p| p.exists()) {
            Some(path) => (Self::read_config(&path)?, Some(path)),
            None => (ConfigFile::default(), None),
        };

        let (project, project_path) = match root {
            Some(root) => Self::load_project(root)?,
            None => (None, None),
        };

        global.validate()?;
        if let Some(ref p) = project {
            p.validate()?;
        }

        let config = Config {
            global,
            project,
            global_path,
            project_path,
        };
        // Thresholds may come from different scopes, so check the merged view too.
        config.effective().validate()?;

        Ok(config)
    }

    /// Locate the global config file, if any.
    fn find_global() -> Option<PathBuf> {
        // 1. Check $CACHELOCK_CONFIG
        if let Ok(path) = std::env::var("CACHELOCK_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        // 2. Check $XDG_CONFIG_HOME/cachelock/config.toml
        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("cachelock/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        // 3. Check ~/.cachelock/config.toml
        let path = Self::global_config_path().ok()?;
        path.exists().then_some(path)
    }

    /// Load `<root>/cachelock.toml`, if present.
    fn load_project(root: &Path) -> Result<(Option<ConfigFile>, Option<PathBuf>), ConfigError> {
        let path = Self::project_config_path(root);
        if !path.exists() {
            return Ok((None, None));
        }
        let config = Self::read_config(&path)?;
        Ok((Some(config), Some(path)))
    }

    /// Read and parse a config file.
    fn read_config(path: &Path) -> Result<ConfigFile, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Get the canonical path for global config.
    ///
    /// Returns `~/.cachelock/config.toml`.
    pub fn global_config_path() -> Result<PathBuf, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(".cachelock/config.toml"))
    }

    /// Get the canonical path for project config under `root`.
    pub fn project_config_path(root: &Path) -> PathBuf {
        root.join(PROJECT_CONFIG_FILE)
    }

    /// Project values layered over global values.
    fn effective(&self) -> ConfigFile {
        match &self.project {
            Some(project) => project.merged_over(&self.global),
            None => self.global.clone(),
        }
    }

    // =========================================================================
    // Accessor methods with precedence
    // =========================================================================

    /// Get the default lock id.
    ///
    /// Defaults to "nuxt" if not configured.
    pub fn default_id(&self) -> String {
        self.effective()
            .default_id
            .unwrap_or_else(|| DEFAULT_LOCK_ID.to_string())
    }

    /// Get the cache directory, relative to the project root.
    ///
    /// Defaults to `node_modules/.cache/nuxt` if not configured.
    pub fn cache_dir(&self) -> PathBuf {
        self.effective()
            .cache_dir
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DIR))
    }

    /// Get the configured stale threshold, if any.
    pub fn stale(&self) -> Option<Duration> {
        self.effective().stale_ms.map(Duration::from_millis)
    }

    /// Get the configured refresh interval, if any.
    pub fn update(&self) -> Option<Duration> {
        self.effective().update_ms.map(Duration::from_millis)
    }

    /// Resolve lock session defaults from this configuration.
    pub fn settings(&self) -> LockSettings {
        let defaults = LockSettings::default();
        LockSettings {
            stale: self.stale().unwrap_or(defaults.stale),
            update: self.update().or(defaults.update),
            cache_dir: self.cache_dir(),
        }
    }

    /// Get the path to the loaded global config file.
    pub fn global_config_loaded_from(&self) -> Option<&Path> {
        self.global_path.as_deref()
    }

    /// Get the path to the loaded project config file.
    pub fn project_config_loaded_from(&self) -> Option<&Path> {
        self.project_path.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn load_empty_defaults() {
        let temp = TempDir::new().unwrap();

        let config = Config::load_with(None, Some(temp.path())).unwrap();

        assert_eq!(config.default_id(), "nuxt");
        assert_eq!(config.cache_dir(), PathBuf::from("node_modules/.cache/nuxt"));
        assert!(config.stale().is_none());
        assert_eq!(config.settings(), LockSettings::default());
        assert!(config.global_config_loaded_from().is_none());
        assert!(config.project_config_loaded_from().is_none());
    }

    #[test]
    fn missing_global_path_is_ignored() {
        let temp = TempDir::new().unwrap();
        let config = Config::load_with(Some(temp.path().join("missing.toml")), None).unwrap();
        assert!(config.global_config_loaded_from().is_none());
    }

    #[test]
    fn load_global_file() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("config.toml");
        fs::write(
            &config_path,
            r#"
            default_id = "build"
            stale_ms = 60000
            "#,
        )
        .unwrap();

        let config = Config::load_with(Some(config_path.clone()), None).unwrap();

        assert_eq!(config.default_id(), "build");
        assert_eq!(config.stale(), Some(Duration::from_secs(60)));
        assert_eq!(config.global_config_loaded_from(), Some(config_path.as_path()));
    }

    #[test]
    fn load_project_config() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join(PROJECT_CONFIG_FILE),
            r#"
            cache_dir = ".cache/locks"
            update_ms = 2000
            "#,
        )
        .unwrap();

        let config = Config::load_with(None, Some(temp.path())).unwrap();
        let settings = config.settings();

        assert_eq!(settings.cache_dir, PathBuf::from(".cache/locks"));
        assert_eq!(settings.update, Some(Duration::from_secs(2)));
        assert_eq!(
            config.project_config_loaded_from(),
            Some(temp.path().join(PROJECT_CONFIG_FILE).as_path())
        );
    }

    #[test]
    fn only_the_canonical_project_file_is_read() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(".cachelock.toml"), "default_id = \"gen\"").unwrap();

        let config = Config::load_with(None, Some(temp.path())).unwrap();

        assert_eq!(config.default_id(), "nuxt");
        assert!(config.project_config_loaded_from().is_none());
    }

    #[test]
    fn precedence_project_overrides_global() {
        let temp = TempDir::new().unwrap();
        let global_path = temp.path().join("global.toml");
        fs::write(&global_path, "default_id = \"global\"\nstale_ms = 40000").unwrap();
        let root = temp.path().join("project");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join(PROJECT_CONFIG_FILE), "default_id = \"project\"").unwrap();

        let config = Config::load_with(Some(global_path), Some(&root)).unwrap();

        assert_eq!(config.default_id(), "project");
        assert_eq!(config.stale(), Some(Duration::from_secs(40)));
    }

    #[test]
    fn cross_scope_thresholds_validated() {
        let temp = TempDir::new().unwrap();
        let global_path = temp.path().join("global.toml");
        fs::write(&global_path, "stale_ms = 4000").unwrap();
        let root = temp.path().join("project");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join(PROJECT_CONFIG_FILE), "update_ms = 3000").unwrap();

        let result = Config::load_with(Some(global_path), Some(&root));
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn unparseable_file_rejected() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(PROJECT_CONFIG_FILE), "stale_ms = \"soon\"").unwrap();

        let result = Config::load_with(None, Some(temp.path()));
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn unknown_fields_rejected() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join(PROJECT_CONFIG_FILE),
            r#"
            default_id = "nuxt"
            unknown_field = true
            "#,
        )
        .unwrap();

        let result = Config::load_with(None, Some(temp.path()));
        assert!(result.is_err());
    }
}

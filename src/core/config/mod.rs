//! core::config
//!
//! Configuration schema and loading.
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Global config file
//! 3. CLI flags (not handled here)
//!
//! # Global Config Locations
//!
//! Searched in order:
//! 1. `$GITDECK_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/gitdeck/config.toml`
//! 3. `~/.gitdeck/config.toml` (canonical write location)
//!
//! # Example
//!
//! ```no_run
//! use gitdeck::core::config::Config;
//!
//! let config = Config::load().unwrap();
//! println!("Workspace: {}", config.workspace().unwrap().display());
//! println!("Page size: {}", config.page_size());
//! ```

pub mod schema;

pub use schema::{AuthorConfig, GlobalConfig, SecretsConfig};

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

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

    #[error("failed to write config file '{path}': {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config value: {0}")]
    InvalidValue(String),

    #[error("home directory not found")]
    NoHomeDir,
}

/// Resolved configuration.
///
/// Accessor methods apply defaults for anything not configured.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Global configuration
    pub global: GlobalConfig,
    /// Path to the global config file (if loaded)
    global_path: Option<PathBuf>,
}

impl Config {
    /// Default branch for new projects.
    pub const DEFAULT_BRANCH: &'static str = "main";
    /// Default history page size.
    pub const DEFAULT_PAGE_SIZE: usize = 20;
    /// Default network timeout.
    pub const DEFAULT_NETWORK_TIMEOUT_SECS: u64 = 60;

    /// Wrap an already-built global config.
    pub fn from_global(global: GlobalConfig) -> Result<Self, ConfigError> {
        global.validate()?;
        Ok(Self {
            global,
            global_path: None,
        })
    }

    /// Load configuration from the default locations.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed or
    /// fails validation. Missing config files are not an error.
    pub fn load() -> Result<Self, ConfigError> {
        match Self::find_global()? {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from an explicit file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let global = Self::read_global_config(path)?;
        global.validate()?;
        Ok(Self {
            global,
            global_path: Some(path.to_path_buf()),
        })
    }

    /// Locate the global config file, if any exists.
    fn find_global() -> Result<Option<PathBuf>, ConfigError> {
        // 1. Check $GITDECK_CONFIG
        if let Ok(path) = std::env::var("GITDECK_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Ok(Some(path));
            }
        }

        // 2. Check $XDG_CONFIG_HOME/gitdeck/config.toml
        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("gitdeck/config.toml");
            if path.exists() {
                return Ok(Some(path));
            }
        }

        // 3. Check ~/.gitdeck/config.toml
        if let Some(home) = dirs::home_dir() {
            let path = home.join(".gitdeck/config.toml");
            if path.exists() {
                return Ok(Some(path));
            }
        }

        Ok(None)
    }

    /// Read and parse a global config file.
    fn read_global_config(path: &Path) -> Result<GlobalConfig, ConfigError> {
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
    /// Returns `~/.gitdeck/config.toml`.
    pub fn global_config_path() -> Result<PathBuf, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(".gitdeck/config.toml"))
    }

    /// Write global config atomically to `path`.
    ///
    /// Creates parent directories if needed.
    pub fn write_global(path: &Path, config: &GlobalConfig) -> Result<(), ConfigError> {
        config.validate()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
                path: path.to_path_buf(),
                source: e,
            })?;
        }

        let contents =
            toml::to_string_pretty(config).map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

        // Write to temp file in same directory (for atomic rename)
        let temp_path = path.with_extension("toml.tmp");
        let mut file = fs::File::create(&temp_path).map_err(|e| ConfigError::WriteError {
            path: temp_path.clone(),
            source: e,
        })?;

        file.write_all(contents.as_bytes())
            .map_err(|e| ConfigError::WriteError {
                path: temp_path.clone(),
                source: e,
            })?;

        file.sync_all().map_err(|e| ConfigError::WriteError {
            path: temp_path.clone(),
            source: e,
        })?;

        fs::rename(&temp_path, path).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(())
    }

    // =========================================================================
    // Accessor methods with defaults
    // =========================================================================

    /// Get the workspace root.
    ///
    /// Defaults to `~/.gitdeck`.
    pub fn workspace(&self) -> Result<PathBuf, ConfigError> {
        match &self.global.workspace {
            Some(path) if path == "~" || path.starts_with("~/") => {
                let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
                Ok(home.join(path.trim_start_matches('~').trim_start_matches('/')))
            }
            Some(path) => Ok(PathBuf::from(path)),
            None => {
                let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
                Ok(home.join(".gitdeck"))
            }
        }
    }

    /// Branch created when a project is initialized.
    ///
    /// Defaults to "main".
    pub fn default_branch(&self) -> &str {
        self.global
            .default_branch
            .as_deref()
            .unwrap_or(Self::DEFAULT_BRANCH)
    }

    /// Default number of commits per history page.
    pub fn page_size(&self) -> usize {
        self.global.page_size.unwrap_or(Self::DEFAULT_PAGE_SIZE)
    }

    /// Timeout for network operations.
    pub fn network_timeout(&self) -> Duration {
        Duration::from_secs(
            self.global
                .network_timeout_secs
                .unwrap_or(Self::DEFAULT_NETWORK_TIMEOUT_SECS),
        )
    }

    /// Fallback author `(name, email)`, if fully configured.
    pub fn author(&self) -> Option<(&str, &str)> {
        let author = self.global.author.as_ref()?;
        Some((author.name.as_deref()?, author.email.as_deref()?))
    }

    /// Get the secrets provider.
    ///
    /// Defaults to "file" if not configured.
    pub fn secrets_provider(&self) -> &str {
        self.global
            .secrets
            .as_ref()
            .and_then(|s| s.provider.as_deref())
            .unwrap_or("file")
    }

    /// Get the path to the loaded global config file.
    pub fn loaded_from(&self) -> Option<&Path> {
        self.global_path.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_apply_when_unset() {
        let config = Config::default();
        assert_eq!(config.default_branch(), "main");
        assert_eq!(config.page_size(), 20);
        assert_eq!(config.network_timeout(), Duration::from_secs(60));
        assert_eq!(config.secrets_provider(), "file");
        assert!(config.author().is_none());
        assert!(config.loaded_from().is_none());
    }

    #[test]
    fn workspace_expands_home() {
        let config = Config::from_global(GlobalConfig {
            workspace: Some("~/decks/work".into()),
            ..GlobalConfig::default()
        })
        .unwrap();
        if let Some(home) = dirs::home_dir() {
            assert_eq!(config.workspace().unwrap(), home.join("decks/work"));
        }
    }

    #[test]
    fn load_from_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(
            &path,
            r#"
            workspace = "/srv/deck"
            page_size = 5

            [author]
            name = "Deck"
            email = "deck@example.com"
            "#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.workspace().unwrap(), PathBuf::from("/srv/deck"));
        assert_eq!(config.page_size(), 5);
        assert_eq!(config.author(), Some(("Deck", "deck@example.com")));
        assert_eq!(config.loaded_from(), Some(path.as_path()));
    }

    #[test]
    fn partial_author_is_ignored() {
        let config = Config::from_global(GlobalConfig {
            author: Some(AuthorConfig {
                name: Some("only name".into()),
                email: None,
            }),
            ..Default::default()
        })
        .unwrap();
        assert!(config.author().is_none());
    }

    #[test]
    fn parse_error_names_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "page_size = \"many\"").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn invalid_values_rejected_on_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "network_timeout_secs = 0").unwrap();

        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn write_then_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/config.toml");
        let global = GlobalConfig {
            default_branch: Some("develop".into()),
            ..Default::default()
        };

        Config::write_global(&path, &global).unwrap();
        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.default_branch(), "develop");
        assert!(!path.with_extension("toml.tmp").exists());
    }
}

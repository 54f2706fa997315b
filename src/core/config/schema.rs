//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Global Config
//!
//! Located at (in order of precedence):
//! 1. `$GITDECK_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/gitdeck/config.toml`
//! 3. `~/.gitdeck/config.toml` (canonical write location)
//!
//! # Validation
//!
//! Config values are validated after parsing to ensure they conform to
//! expected formats (e.g., the default branch must be a valid branch name).

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::types::BranchName;

/// Global configuration (user scope).
///
/// # Example
///
/// ```toml
/// workspace = "/srv/gitdeck"
/// default_branch = "main"
/// page_size = 20
/// network_timeout_secs = 60
///
/// [author]
/// name = "Deck User"
/// email = "deck@example.com"
///
/// [secrets]
/// provider = "file"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalConfig {
    /// Root directory for the registry and all project working trees
    pub workspace: Option<String>,

    /// Branch created by project initialization
    pub default_branch: Option<String>,

    /// Default number of commits per history page
    pub page_size: Option<usize>,

    /// Timeout applied to fetch/pull/push and remote status
    pub network_timeout_secs: Option<u64>,

    /// Fallback commit identity
    pub author: Option<AuthorConfig>,

    /// Secret storage settings
    pub secrets: Option<SecretsConfig>,
}

impl GlobalConfig {
    /// Largest accepted page size.
    pub const MAX_PAGE_SIZE: usize = 500;

    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(workspace) = &self.workspace {
            if workspace.trim().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "workspace cannot be empty".to_string(),
                ));
            }
        }

        if let Some(branch) = &self.default_branch {
            BranchName::new(branch).map_err(|e| {
                ConfigError::InvalidValue(format!("invalid default_branch: {}", e))
            })?;
        }

        if let Some(size) = self.page_size {
            if size == 0 || size > Self::MAX_PAGE_SIZE {
                return Err(ConfigError::InvalidValue(format!(
                    "page_size must be between 1 and {}, got {}",
                    Self::MAX_PAGE_SIZE,
                    size
                )));
            }
        }

        if self.network_timeout_secs == Some(0) {
            return Err(ConfigError::InvalidValue(
                "network_timeout_secs must be greater than zero".to_string(),
            ));
        }

        if let Some(author) = &self.author {
            author.validate()?;
        }

        if let Some(secrets) = &self.secrets {
            secrets.validate()?;
        }

        Ok(())
    }
}

/// Commit identity used when a repository has no `user.name`/`user.email`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct AuthorConfig {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl AuthorConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if matches!(&self.name, Some(n) if n.trim().is_empty()) {
            return Err(ConfigError::InvalidValue(
                "author.name cannot be empty".to_string(),
            ));
        }
        if matches!(&self.email, Some(e) if !e.contains('@')) {
            return Err(ConfigError::InvalidValue(
                "author.email must contain '@'".to_string(),
            ));
        }
        Ok(())
    }
}

/// Secrets configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SecretsConfig {
    /// Provider to use ("file" or "memory")
    pub provider: Option<String>,
}

impl SecretsConfig {
    /// Valid secret providers.
    pub const VALID_PROVIDERS: &'static [&'static str] = &["file", "memory"];

    /// Validate the secrets configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(provider) = &self.provider {
            if !Self::VALID_PROVIDERS.contains(&provider.as_str()) {
                return Err(ConfigError::InvalidValue(format!(
                    "invalid secrets provider '{}', must be one of: {}",
                    provider,
                    Self::VALID_PROVIDERS.join(", ")
                )));
            }
        }
        Ok(())
    }
}

//! secrets::traits
//!
//! Secret storage trait definition.
//!
//! Keys are namespaced by project and remote (see [`remote_key`]) so two
//! projects with an `origin` remote never share credentials.
//!
//! Implementations must never log, print, or include secret values in
//! error messages.

use thiserror::Error;

use crate::core::types::{ProjectName, RemoteName};

/// Errors from secret storage operations.
///
/// Messages never include secret values.
#[derive(Debug, Error)]
pub enum SecretError {
    #[error("secret not found: {0}")]
    NotFound(String),

    #[error("failed to read secrets: {0}")]
    ReadError(String),

    #[error("failed to write secrets: {0}")]
    WriteError(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Provider not available or not configured
    #[error("secret provider not available: {0}")]
    ProviderNotAvailable(String),
}

/// Key-value store for remote credentials.
pub trait SecretStore: Send + Sync {
    /// Get a secret by key. `Ok(None)` when absent.
    fn get(&self, key: &str) -> Result<Option<String>, SecretError>;

    /// Set a secret, replacing any existing value.
    fn set(&self, key: &str, value: &str) -> Result<(), SecretError>;

    /// Delete a secret. Deleting an absent key succeeds.
    fn delete(&self, key: &str) -> Result<(), SecretError>;

    fn exists(&self, key: &str) -> Result<bool, SecretError> {
        Ok(self.get(key)?.is_some())
    }
}

/// Key under which credentials for `remote` of `project` are stored.
pub fn remote_key(project: &ProjectName, remote: &RemoteName) -> String {
    format!("remote.{project}.{remote}")
}

//! secrets
//!
//! Storage for remote credentials.
//!
//! Credentials are kept out of the registry: a [`Remote`] records only the
//! key its `username:token` pair is stored under, and the value lives in a
//! [`SecretStore`].
//!
//! # Providers
//!
//! - `"file"` (default): [`FileSecretStore`] at `<workspace>/secrets.toml`
//! - `"memory"`: [`MemorySecretStore`], forgotten on exit
//!
//! [`Remote`]: crate::core::registry::Remote

mod file_store;
mod memory_store;
mod traits;

use std::sync::Arc;

pub use file_store::FileSecretStore;
pub use memory_store::MemorySecretStore;
pub use traits::{remote_key, SecretError, SecretStore};

use crate::core::paths::DeckPaths;

/// The default provider name.
pub const DEFAULT_PROVIDER: &str = "file";

/// Create the secret store named by `provider`.
pub fn create_store(provider: &str, paths: &DeckPaths) -> Result<Arc<dyn SecretStore>, SecretError> {
    match provider {
        "file" => Ok(Arc::new(FileSecretStore::new(paths))),
        "memory" => Ok(Arc::new(MemorySecretStore::new())),
        other => Err(SecretError::ProviderNotAvailable(format!(
            "unknown secret provider: '{other}' (valid: file, memory)"
        ))),
    }
}

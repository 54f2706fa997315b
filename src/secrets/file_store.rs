//! secrets::file_store
//!
//! File-based secret storage at `<workspace>/secrets.toml`.
//!
//! - Permissions are 0600 on Unix, set before any content is written
//! - Writes go to a temp file which is synced and renamed into place
//! - Read-modify-write cycles are serialized by an in-process mutex

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

use super::traits::{SecretError, SecretStore};
use crate::core::paths::DeckPaths;

/// TOML file of `key = "username:token"` entries.
#[derive(Debug)]
pub struct FileSecretStore {
    path: PathBuf,
    write: Mutex<()>,
}

impl FileSecretStore {
    /// Store inside the workspace.
    pub fn new(paths: &DeckPaths) -> Self {
        Self::with_path(paths.secrets_path())
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self {
            path,
            write: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_secrets(&self) -> Result<BTreeMap<String, String>, SecretError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                return Err(SecretError::PermissionDenied(self.path.display().to_string()))
            }
            Err(e) => return Err(SecretError::ReadError(format!("cannot read secrets file: {e}"))),
        };

        // toml errors can quote the offending line, so only the position is kept
        toml::from_str(&content).map_err(|e| {
            let at = e
                .span()
                .map(|span| format!(" at byte {}", span.start))
                .unwrap_or_default();
            SecretError::ReadError(format!("cannot parse secrets file{at}"))
        })
    }

    fn write_secrets(&self, secrets: &BTreeMap<String, String>) -> Result<(), SecretError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| SecretError::WriteError(format!("cannot create directory: {e}")))?;
        }

        let content = toml::to_string(secrets)
            .map_err(|e| SecretError::WriteError(format!("cannot serialize secrets: {e}")))?;

        let temp_path = self.path.with_extension("toml.tmp");
        {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp_path)
                .map_err(|e| SecretError::WriteError(format!("cannot create temp file: {e}")))?;

            #[cfg(unix)]
            file.set_permissions(fs::Permissions::from_mode(0o600))
                .map_err(|e| SecretError::WriteError(format!("cannot set permissions: {e}")))?;

            file.write_all(content.as_bytes())
                .and_then(|()| file.sync_all())
                .map_err(|e| SecretError::WriteError(format!("cannot write secrets: {e}")))?;
        }

        fs::rename(&temp_path, &self.path)
            .map_err(|e| SecretError::WriteError(format!("cannot rename temp file: {e}")))
    }

    fn modify(&self, f: impl FnOnce(&mut BTreeMap<String, String>) -> bool) -> Result<(), SecretError> {
        let _held = self.write.lock().unwrap_or_else(PoisonError::into_inner);
        let mut secrets = self.read_secrets()?;
        if f(&mut secrets) {
            self.write_secrets(&secrets)?;
        }
        Ok(())
    }

    /// True when the file is absent or mode 0600.
    #[cfg(unix)]
    pub fn verify_permissions(&self) -> Result<bool, SecretError> {
        match fs::metadata(&self.path) {
            Ok(metadata) => Ok(metadata.permissions().mode() & 0o777 == 0o600),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(true),
            Err(e) => Err(SecretError::ReadError(format!("cannot read file metadata: {e}"))),
        }
    }

    #[cfg(not(unix))]
    pub fn verify_permissions(&self) -> Result<bool, SecretError> {
        Ok(true)
    }
}

impl SecretStore for FileSecretStore {
    fn get(&self, key: &str) -> Result<Option<String>, SecretError> {
        Ok(self.read_secrets()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SecretError> {
        self.modify(|secrets| {
            secrets.insert(key.to_string(), value.to_string());
            true
        })
    }

    fn delete(&self, key: &str) -> Result<(), SecretError> {
        self.modify(|secrets| secrets.remove(key).is_some())
    }
}

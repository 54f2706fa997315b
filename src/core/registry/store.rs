//! core::registry::store
//!
//! JSON-file persistence for the registry and active-pointer documents.
//!
//! # Architecture
//!
//! Each document lives in its own file under the workspace. Every mutation
//! is a read-modify-write performed under the [`StoreLock`], and every
//! write goes to a temp file that is synced and renamed into place. A
//! reader therefore always sees the last acknowledged write, in this
//! process or another one.
//!
//! A missing file reads as the empty document.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use super::schema::{parse_active, parse_registry, ActiveDocV1, RegistryDocV1, SchemaError};
use crate::core::ops::lock::{LockError, StoreLock};
use crate::core::paths::DeckPaths;

/// Errors from store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading a store file failed.
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Writing a store file failed.
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A store file is malformed or from an unsupported version.
    #[error("invalid store file {path}: {source}")]
    Schema { path: PathBuf, source: SchemaError },

    /// Serializing a document failed.
    #[error("failed to serialize document: {0}")]
    Serialize(String),

    /// The store lock could not be taken.
    #[error("store lock error: {0}")]
    Lock(#[from] LockError),
}

/// File-backed store for both registry documents.
#[derive(Debug, Clone)]
pub struct RegistryStore {
    paths: DeckPaths,
}

impl RegistryStore {
    /// Create a store rooted at the workspace in `paths`.
    pub fn new(paths: DeckPaths) -> Self {
        Self { paths }
    }

    /// Path routing used by this store.
    pub fn paths(&self) -> &DeckPaths {
        &self.paths
    }

    /// Read the registry document.
    pub fn read_registry(&self) -> Result<RegistryDocV1, StoreError> {
        read_doc(&self.paths.registry_path(), parse_registry)
    }

    /// Read the active-pointer document.
    pub fn read_active(&self) -> Result<ActiveDocV1, StoreError> {
        read_doc(&self.paths.active_path(), parse_active)
    }

    /// Read-modify-write the registry under the store lock.
    ///
    /// The document is only written if `f` succeeds.
    pub fn update_registry<T, E>(
        &self,
        f: impl FnOnce(&mut RegistryDocV1) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        let _lock = StoreLock::acquire(&self.paths).map_err(StoreError::from)?;
        let mut doc = self.read_registry()?;
        let value = f(&mut doc)?;
        write_doc(&self.paths.registry_path(), &doc)?;
        Ok(value)
    }

    /// Read-modify-write the active-pointer document under the store lock.
    pub fn update_active<T, E>(
        &self,
        f: impl FnOnce(&mut ActiveDocV1) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        let _lock = StoreLock::acquire(&self.paths).map_err(StoreError::from)?;
        let mut doc = self.read_active()?;
        let value = f(&mut doc)?;
        write_doc(&self.paths.active_path(), &doc)?;
        Ok(value)
    }

    /// Read-modify-write both documents atomically with respect to other
    /// store users.
    ///
    /// Used when deleting a project, which must drop it from the registry
    /// and clear every pointer to it in one step.
    pub fn update_both<T, E>(
        &self,
        f: impl FnOnce(&mut RegistryDocV1, &mut ActiveDocV1) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        let _lock = StoreLock::acquire(&self.paths).map_err(StoreError::from)?;
        let mut registry = self.read_registry()?;
        let mut active = self.read_active()?;
        let value = f(&mut registry, &mut active)?;
        write_doc(&self.paths.active_path(), &active)?;
        write_doc(&self.paths.registry_path(), &registry)?;
        Ok(value)
    }
}

fn read_doc<T: Default>(
    path: &Path,
    parse: impl FnOnce(&str) -> Result<T, SchemaError>,
) -> Result<T, StoreError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
        Err(e) => {
            return Err(StoreError::Read {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };

    parse(&contents).map_err(|source| StoreError::Schema {
        path: path.to_path_buf(),
        source,
    })
}

/// Write a document atomically (temp file, fsync, rename).
fn write_doc<T: Serialize>(path: &Path, doc: &T) -> Result<(), StoreError> {
    let write_err = |source| StoreError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(write_err)?;
    }

    let json =
        serde_json::to_string_pretty(doc).map_err(|e| StoreError::Serialize(e.to_string()))?;

    let temp_path = path.with_extension("json.tmp");
    {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .map_err(write_err)?;
        file.write_all(json.as_bytes()).map_err(write_err)?;
        file.sync_all().map_err(write_err)?;
    }

    fs::rename(&temp_path, path).map_err(write_err)?;
    Ok(())
}

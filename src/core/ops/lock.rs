//! core::ops::lock
//!
//! Exclusive lock guarding the persisted registry files.
//!
//! # Architecture
//!
//! The store lock serializes every read-modify-write of `registry.json` and
//! `active.json` across processes sharing one workspace. It is distinct from
//! the in-process [`OperationSerializer`](super::serializer::OperationSerializer),
//! which guards working trees.
//!
//! # Storage
//!
//! - `<workspace>/store.lock` - Lock file with OS-level exclusive lock
//!
//! # Invariants
//!
//! - Lock is held for the whole read-modify-write of a store file
//! - Lock is automatically released on drop (RAII pattern)
//! - `acquire` blocks until the lock is free
//!
//! # Example
//!
//! ```ignore
//! use gitdeck::core::ops::lock::StoreLock;
//! use gitdeck::core::paths::DeckPaths;
//!
//! let paths = DeckPaths::new("/data/gitdeck".into());
//! let lock = StoreLock::acquire(&paths)?;
//! // ... read, modify, write registry.json ...
//! drop(lock);
//! ```

use std::fs::{self, File, OpenOptions};

use fs2::FileExt;
use thiserror::Error;

use crate::core::paths::DeckPaths;

/// Errors from locking operations.
#[derive(Debug, Error)]
pub enum LockError {
    /// Failed to create lock file or directory.
    #[error("failed to create lock: {0}")]
    CreateFailed(String),

    /// Failed to acquire the OS lock.
    #[error("failed to acquire lock: {0}")]
    AcquireFailed(String),
}

/// An exclusive lock on the workspace store.
///
/// The lock is released when this guard is dropped, even if the holder
/// panics.
#[derive(Debug)]
pub struct StoreLock {
    /// The open file handle with the lock held.
    file: File,
}

impl StoreLock {
    /// Acquire the store lock, blocking until it is available.
    pub fn acquire(paths: &DeckPaths) -> Result<Self, LockError> {
        let file = Self::open(paths)?;
        file.lock_exclusive()
            .map_err(|e| LockError::AcquireFailed(e.to_string()))?;
        Ok(Self { file })
    }

    /// Open or create the lock file, creating the workspace if needed.
    fn open(paths: &DeckPaths) -> Result<File, LockError> {
        let workspace = paths.workspace();
        fs::create_dir_all(workspace).map_err(|e| {
            LockError::CreateFailed(format!("cannot create {}: {}", workspace.display(), e))
        })?;

        let path = paths.store_lock_path();
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| {
                LockError::CreateFailed(format!("cannot open {}: {}", path.display(), e))
            })
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        // closing the handle releases the lock too
        let _ = self.file.unlock();
    }
}

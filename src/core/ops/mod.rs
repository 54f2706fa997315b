//! core::ops
//!
//! Locking for persisted state and working trees.
//!
//! # Modules
//!
//! - [`lock`] - Cross-process lock for the registry files
//! - [`serializer`] - Per-project, in-process operation serializer
//!
//! # Architecture
//!
//! Every mutating operation:
//! 1. Acquires the project's exclusive lock from the serializer
//! 2. Runs its git work on the blocking pool while the lock is held
//! 3. Takes the store lock only for the short read-modify-write of
//!    `registry.json` / `active.json`
//!
//! The store lock is always the innermost lock, so the two never deadlock.

pub mod lock;
pub mod serializer;

pub use lock::{LockError, StoreLock};
pub use serializer::{ExclusiveGuard, OperationSerializer, SharedGuard};

//! core
//!
//! Domain types, persisted state, and concurrency primitives for gitdeck.
//!
//! # Modules
//!
//! - [`types`] - Strong types: ProjectName, BranchName, Oid, etc.
//! - [`paths`] - Centralized path routing for workspace storage
//! - [`config`] - Configuration schema and loading
//! - [`ops`] - Store lock and per-project operation serializer
//! - [`registry`] - Project registry schema and storage
//! - [`active`] - Per-user active project tracking
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid names from reaching git or the filesystem
//! - Persisted documents are strict and self-describing
//! - Every lock is scoped to a guard

pub mod active;
pub mod config;
pub mod ops;
pub mod paths;
pub mod registry;
pub mod types;

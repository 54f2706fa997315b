//! gitdeck - versioned projects for many users, backed by git
//!
//! gitdeck keeps a registry of projects, each one a git repository in a
//! shared workspace, and lets many users work on them side by side: every
//! user has an active project, operations on one project are serialized,
//! and merges, pulls and pushes report their outcome as data.
//!
//! # Architecture
//!
//! The codebase follows a strict layered architecture:
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to engine)
//! - [`engine`] - Every project operation, gated and serialized per project
//! - [`core`] - Domain types, configuration, registry, active pointers, locks
//! - [`git`] - Single interface for all Git operations
//! - [`secrets`] - Secret storage for remote credentials
//! - [`ui`] - Output and prompts
//!
//! # Correctness Invariants
//!
//! gitdeck maintains the following invariants:
//!
//! 1. Two mutations of the same project never overlap
//! 2. The registry only lists projects whose repository was created
//! 3. A merge in progress blocks everything but resolve, abort and commit
//! 4. Credentials never appear in the registry, logs or output

pub mod cli;
pub mod core;
pub mod engine;
pub mod git;
pub mod secrets;
pub mod ui;

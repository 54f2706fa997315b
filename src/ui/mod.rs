//! ui
//!
//! User interaction utilities.
//!
//! # Modules
//!
//! - [`output`] - JSON output and error reporting
//! - [`prompts`] - Masked token input
//!
//! # Design
//!
//! Results go to stdout as JSON; errors and prompts go to stderr so that
//! stdout stays machine-readable.

pub mod output;
pub mod prompts;

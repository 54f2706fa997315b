//! ui::output
//!
//! Output formatting and display.
//!
//! # Design
//!
//! Every command result is printed as pretty JSON on stdout and respects
//! the quiet flag. Errors are printed as a JSON object on stderr and are
//! always shown.

use std::io::Write;

use serde::Serialize;
use serde_json::json;

use crate::core::config::ConfigError;
use crate::core::types::TypeError;
use crate::engine::{EngineError, ErrorKind};

/// Output verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Quiet mode - no output on success
    Quiet,
    /// Normal mode - standard output
    Normal,
}

impl Verbosity {
    /// Create verbosity from flags.
    pub fn from_flags(quiet: bool) -> Self {
        if quiet {
            Verbosity::Quiet
        } else {
            Verbosity::Normal
        }
    }
}

/// Print a command result (respects quiet mode).
pub fn emit<T: Serialize + ?Sized>(value: &T, verbosity: Verbosity) -> anyhow::Result<()> {
    if verbosity == Verbosity::Quiet {
        return Ok(());
    }
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}

/// Code, status and kind of a failed command.
///
/// Engine errors carry their own; invalid names and configuration found
/// before the engine ran count as invalid input.
fn classify(err: &anyhow::Error) -> (&'static str, u16, ErrorKind) {
    if let Some(engine) = err.downcast_ref::<EngineError>() {
        return (engine.code(), engine.status_code(), engine.kind());
    }
    if err.downcast_ref::<TypeError>().is_some() {
        return ("invalid_argument", 400, ErrorKind::InvalidInput);
    }
    if let Some(config) = err.downcast_ref::<ConfigError>() {
        return match config {
            ConfigError::InvalidValue(_) | ConfigError::ParseError { .. } => {
                ("invalid_argument", 400, ErrorKind::InvalidInput)
            }
            _ => ("storage_unavailable", 503, ErrorKind::StorageUnavailable),
        };
    }
    ("internal", 500, ErrorKind::Internal)
}

/// JSON body describing a failed command.
pub fn error_body(err: &anyhow::Error) -> serde_json::Value {
    let (code, status, _) = classify(err);
    json!({
        "error": {
            "code": code,
            "status": status,
            "message": format!("{err:#}"),
        }
    })
}

/// Print an error (always shown).
pub fn error(err: &anyhow::Error) {
    let body = error_body(err);
    match serde_json::to_string_pretty(&body) {
        Ok(text) => eprintln!("{text}"),
        Err(_) => eprintln!("error: {err:#}"),
    }
}

/// Process exit code for a failed command.
///
/// Usage errors from argument parsing exit with 2 before reaching here.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    match classify(err).2 {
        ErrorKind::NotFound => 3,
        ErrorKind::AlreadyExists | ErrorKind::Conflict => 4,
        ErrorKind::InvalidState | ErrorKind::InvalidInput => 5,
        ErrorKind::Unreachable => 6,
        ErrorKind::StorageUnavailable => 7,
        ErrorKind::PermissionDenied => 8,
        ErrorKind::Internal => 1,
    }
}

//! ui::prompts
//!
//! Masked token input.
//!
//! # Design
//!
//! `$GITDECK_TOKEN` wins so scripts never block on a prompt. Otherwise the
//! token is read from the terminal without echo.

use thiserror::Error;

/// Environment variable consulted before prompting.
pub const TOKEN_ENV: &str = "GITDECK_TOKEN";

/// Errors from prompts.
#[derive(Debug, Error)]
pub enum PromptError {
    #[error("no token given")]
    Empty,

    #[error("IO error: {0}")]
    IoError(String),
}

/// Read an access token for `username`.
pub fn token(username: &str) -> Result<String, PromptError> {
    if let Ok(token) = std::env::var(TOKEN_ENV) {
        return non_empty(token);
    }
    let token = rpassword::prompt_password(format!("Token for {username}: "))
        .map_err(|e| PromptError::IoError(e.to_string()))?;
    non_empty(token)
}

fn non_empty(token: String) -> Result<String, PromptError> {
    let token = token.trim().to_string();
    if token.is_empty() {
        Err(PromptError::Empty)
    } else {
        Ok(token)
    }
}

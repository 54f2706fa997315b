//! config command - Show the configuration in use

use anyhow::Result;
use serde_json::json;

use crate::cli::args::ConfigCommand;
use crate::core::config::Config;
use crate::ui::output::{emit, Verbosity};

pub fn config(command: ConfigCommand, config: &Config, verbosity: Verbosity) -> Result<()> {
    match command {
        ConfigCommand::Path => {
            let path = match config.loaded_from() {
                Some(path) => path.to_path_buf(),
                None => Config::global_config_path()?,
            };
            emit(
                &json!({ "path": path, "exists": config.loaded_from().is_some() }),
                verbosity,
            )
        }
        ConfigCommand::Show => {
            let (author_name, author_email) = match config.author() {
                Some((name, email)) => (Some(name), Some(email)),
                None => (None, None),
            };
            emit(
                &json!({
                    "workspace": config.workspace()?,
                    "default_branch": config.default_branch(),
                    "page_size": config.page_size(),
                    "network_timeout_secs": config.network_timeout().as_secs(),
                    "author": { "name": author_name, "email": author_email },
                    "secrets": { "provider": config.secrets_provider() },
                }),
                verbosity,
            )
        }
    }
}

//! cli
//!
//! Command-line interface layer for gitdeck.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Install logging
//! - Delegate to command handlers
//! - Does NOT touch repositories directly
//!
//! # Architecture
//!
//! The CLI layer is thin. It parses arguments via clap, builds an
//! [`Engine`](crate::engine::Engine) from the resolved configuration and
//! dispatches to it on a tokio runtime. Every result is printed as JSON.

pub mod args;
pub mod commands;

pub use args::{Cli, Command, Shell};

use anyhow::{Context as _, Result};
use tracing_subscriber::EnvFilter;

use crate::core::config::Config;
use crate::core::types::{ProjectName, UserId};
use crate::engine::Engine;
use crate::ui::output::Verbosity;

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "GITDECK_LOG";

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub fn run() -> Result<()> {
    let cli = Cli::parse_args();
    init_logging(cli.debug);

    // needs neither configuration nor a workspace
    if let Command::Completion { shell } = cli.command {
        return commands::completion(shell);
    }

    let config = load_config(&cli)?;
    if let Command::Config(command) = cli.command {
        return commands::config(command, &config, Verbosity::from_flags(cli.quiet));
    }

    let ctx = commands::Context {
        user: UserId::new(cli.user_id()).context("invalid --user")?,
        project: cli
            .project
            .as_deref()
            .map(ProjectName::new)
            .transpose()
            .context("invalid --project")?,
        verbosity: Verbosity::from_flags(cli.quiet),
        engine: Engine::new(config)?,
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start runtime")?;
    runtime.block_on(commands::dispatch(cli.command, &ctx))
}

/// Log to stderr, filtered by `$GITDECK_LOG` (default `warn`).
fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    // a subscriber may already be installed when embedded
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Configuration from `--config` or the default locations, with
/// `--workspace` applied on top.
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(workspace) = &cli.workspace {
        config.global.workspace = Some(workspace.to_string_lossy().into_owned());
    }
    Ok(config)
}

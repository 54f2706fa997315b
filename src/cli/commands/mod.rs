//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Validates command-specific arguments
//! 2. Calls the engine to execute the command
//! 3. Prints the result as JSON
//!
//! Handlers do NOT touch repositories directly.

mod completion;
mod config_cmd;
mod projects;
mod remote;
mod workspace;

pub use completion::completion;
pub use config_cmd::config;

use anyhow::Result;
use serde::Serialize;

use crate::cli::args::Command;
use crate::core::types::{ProjectName, UserId};
use crate::engine::{Engine, EngineError};
use crate::ui::output::{self, Verbosity};

/// Everything a handler needs.
#[derive(Debug)]
pub struct Context {
    pub engine: Engine,
    pub user: UserId,
    /// `--project`, if given
    pub project: Option<ProjectName>,
    pub verbosity: Verbosity,
}

impl Context {
    /// The project to act on: `--project`, else the user's active project.
    pub async fn project(&self) -> Result<ProjectName> {
        if let Some(name) = &self.project {
            return Ok(name.clone());
        }
        match self.engine.get_active_project(&self.user).await? {
            Some(project) => Ok(project.name),
            None => Err(EngineError::NotFound(format!(
                "active project of user '{}' (pass --project or run `gitdeck projects activate`)",
                self.user
            ))
            .into()),
        }
    }

    /// Print a result.
    pub fn emit<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        output::emit(value, self.verbosity)
    }
}

/// Route a parsed command to its handler.
pub async fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Available => ctx.emit(&serde_json::json!({ "available": ctx.engine.available() })),
        Command::Projects(command) => projects::run(command, ctx).await,
        Command::Status { remote, timeout } => workspace::status(ctx, remote, timeout).await,
        Command::Branches { remote } => workspace::branches(ctx, remote).await,
        Command::Branch(command) => workspace::branch(command, ctx).await,
        Command::Commit { message } => workspace::commit(ctx, &message).await,
        Command::Log { limit, before } => workspace::log(ctx, limit, before).await,
        Command::ShowCommit { reference } => workspace::show_commit(ctx, &reference).await,
        Command::Files => workspace::files(ctx).await,
        Command::Cat { path, from } => workspace::cat(ctx, &path, &from).await,
        Command::Stage { paths } => workspace::stage(ctx, paths).await,
        Command::Unstage { paths, all } => workspace::unstage(ctx, paths, all).await,
        Command::Revert { path } => workspace::revert(ctx, &path).await,
        Command::Diff(args) => workspace::diff(ctx, args).await,
        Command::Merge(command) => workspace::merge(command, ctx).await,
        Command::Remote(command) => remote::run(command, ctx).await,
        Command::Pull {
            remote,
            track,
            allow_unrelated_histories,
            timeout,
        } => remote::pull(ctx, remote, track, allow_unrelated_histories, timeout).await,
        Command::Push {
            remote,
            track,
            timeout,
        } => remote::push(ctx, remote, track, timeout).await,
        // handled before an engine exists
        Command::Config(_) | Command::Completion { .. } => Ok(()),
    }
}

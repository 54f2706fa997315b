//! projects command - Create, inspect and remove projects

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context as _, Result};
use serde_json::json;

use super::Context;
use crate::cli::args::ProjectsCommand;
use crate::core::types::{BranchName, ProjectName};
use crate::engine::{ProjectSource, ProjectSpec, ProjectUpdate};
use crate::git::Credentials;
use crate::ui::prompts;

pub async fn run(command: ProjectsCommand, ctx: &Context) -> Result<()> {
    let engine = &ctx.engine;
    let user = &ctx.user;
    match command {
        ProjectsCommand::List => ctx.emit(&engine.list_projects(user).await?),
        ProjectsCommand::Create {
            name,
            description,
            template,
            files,
            clone,
            branch,
            username,
        } => {
            let source = match clone {
                Some(url) => ProjectSource::Clone {
                    url,
                    credentials: username.map(credentials).transpose()?,
                    branch: branch.map(BranchName::new).transpose()?,
                },
                None if template || !files.is_empty() => ProjectSource::Template {
                    files: read_files(files)?,
                },
                None => ProjectSource::Empty,
            };
            let spec = ProjectSpec {
                name: ProjectName::new(name)?,
                description,
                source,
            };
            ctx.emit(&engine.create_project(user, spec).await?)
        }
        ProjectsCommand::Init { name, files } => {
            let name = ProjectName::new(name)?;
            let commit = engine
                .initialise_project(user, &name, read_files(files)?)
                .await?;
            ctx.emit(&commit)
        }
        ProjectsCommand::Show { name } => {
            let name = resolve(ctx, name).await?;
            ctx.emit(&engine.get_project(user, &name).await?)
        }
        ProjectsCommand::Update { name, description } => {
            let name = resolve(ctx, name).await?;
            let update = ProjectUpdate {
                description: Some(description),
            };
            ctx.emit(&engine.update_project(user, &name, update).await?)
        }
        ProjectsCommand::Delete { name } => {
            let name = ProjectName::new(name)?;
            engine.delete_project(user, &name).await?;
            ctx.emit(&json!({ "deleted": name }))
        }
        ProjectsCommand::Activate { name } => {
            let name = ProjectName::new(name)?;
            ctx.emit(&engine.set_active_project(user, &name).await?)
        }
        ProjectsCommand::Active => ctx.emit(&engine.get_active_project(user).await?),
    }
}

async fn resolve(ctx: &Context, name: Option<String>) -> Result<ProjectName> {
    match name {
        Some(name) => Ok(ProjectName::new(name)?),
        None => ctx.project().await,
    }
}

/// Credentials for `username`, with the token from the environment or a prompt.
pub(super) fn credentials(username: String) -> Result<Credentials> {
    let token = prompts::token(&username)?;
    Ok(Credentials { username, token })
}

/// Read `DEST=LOCAL_PATH` pairs into repository files.
fn read_files(files: Vec<(String, PathBuf)>) -> Result<BTreeMap<String, String>> {
    files
        .into_iter()
        .map(|(dest, path)| {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            Ok((dest, content))
        })
        .collect()
}

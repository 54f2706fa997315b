//! Working-tree commands: status, branches, history, files, diffs and merges

use std::time::Duration;

use anyhow::{Context as _, Result};
use serde_json::json;

use super::Context;
use crate::cli::args::{BranchCommand, DiffArgs, MergeCommand};
use crate::core::types::BranchName;
use crate::engine::{CommitQuery, DiffType, Resolution, StatusOptions, TreeRef};

pub async fn status(ctx: &Context, remote: bool, timeout: Option<u64>) -> Result<()> {
    let name = ctx.project().await?;
    let options = StatusOptions {
        include_remote: remote,
        timeout: timeout.map(Duration::from_secs),
    };
    ctx.emit(&ctx.engine.get_status(&ctx.user, &name, options).await?)
}

pub async fn branches(ctx: &Context, remote: bool) -> Result<()> {
    let name = ctx.project().await?;
    ctx.emit(&ctx.engine.get_branches(&ctx.user, &name, remote).await?)
}

pub async fn branch(command: BranchCommand, ctx: &Context) -> Result<()> {
    let name = ctx.project().await?;
    let engine = &ctx.engine;
    match command {
        BranchCommand::Status { branch } => {
            let branch = BranchName::new(branch)?;
            ctx.emit(&engine.get_branch_status(&ctx.user, &name, &branch).await?)
        }
        BranchCommand::Switch { branch, create } => {
            let branch = BranchName::new(branch)?;
            engine.set_branch(&ctx.user, &name, &branch, create).await?;
            ctx.emit(&json!({ "branch": branch }))
        }
        BranchCommand::Delete { branch, force } => {
            let branch = BranchName::new(branch)?;
            engine.delete_branch(&ctx.user, &name, &branch, force).await?;
            ctx.emit(&json!({ "deleted": branch }))
        }
    }
}

pub async fn commit(ctx: &Context, message: &str) -> Result<()> {
    let name = ctx.project().await?;
    ctx.emit(&ctx.engine.commit(&ctx.user, &name, message).await?)
}

pub async fn log(ctx: &Context, limit: Option<usize>, before: Option<String>) -> Result<()> {
    let name = ctx.project().await?;
    let query = CommitQuery { limit, before };
    ctx.emit(&ctx.engine.get_commits(&ctx.user, &name, query).await?)
}

pub async fn show_commit(ctx: &Context, reference: &str) -> Result<()> {
    let name = ctx.project().await?;
    ctx.emit(&ctx.engine.get_commit(&ctx.user, &name, reference).await?)
}

pub async fn files(ctx: &Context) -> Result<()> {
    let name = ctx.project().await?;
    ctx.emit(&ctx.engine.get_files(&ctx.user, &name).await?)
}

/// Print the raw file content rather than JSON so it can be piped.
pub async fn cat(ctx: &Context, path: &str, from: &str) -> Result<()> {
    let name = ctx.project().await?;
    let content = ctx
        .engine
        .get_file(&ctx.user, &name, path, tree_ref(from))
        .await?;
    if ctx.verbosity != crate::ui::output::Verbosity::Quiet {
        print!("{content}");
    }
    Ok(())
}

pub async fn stage(ctx: &Context, paths: Vec<String>) -> Result<()> {
    let name = ctx.project().await?;
    ctx.engine.stage_files(&ctx.user, &name, paths.clone()).await?;
    ctx.emit(&json!({ "staged": paths }))
}

pub async fn unstage(ctx: &Context, paths: Vec<String>, all: bool) -> Result<()> {
    let name = ctx.project().await?;
    let selection = if all { None } else { Some(paths.clone()) };
    ctx.engine.unstage_files(&ctx.user, &name, selection).await?;
    ctx.emit(&json!({ "unstaged": if all { json!("all") } else { json!(paths) } }))
}

pub async fn revert(ctx: &Context, path: &str) -> Result<()> {
    let name = ctx.project().await?;
    ctx.engine.revert_file(&ctx.user, &name, path).await?;
    ctx.emit(&json!({ "reverted": path }))
}

pub async fn diff(ctx: &Context, args: DiffArgs) -> Result<()> {
    let name = ctx.project().await?;
    let diff = match (args.commit, args.staged) {
        (Some(to), _) => DiffType::Commit {
            from: args.from,
            to,
        },
        (None, true) => DiffType::Staged,
        (None, false) => DiffType::Unstaged,
    };
    ctx.emit(
        &ctx.engine
            .get_file_diff(&ctx.user, &name, &args.path, diff)
            .await?,
    )
}

pub async fn merge(command: MergeCommand, ctx: &Context) -> Result<()> {
    let name = ctx.project().await?;
    match command {
        MergeCommand::Abort => {
            ctx.engine.abort_merge(&ctx.user, &name).await?;
            ctx.emit(&json!({ "aborted": true }))
        }
        MergeCommand::Resolve {
            path,
            ours,
            theirs: _,
            content,
        } => {
            let resolution = match content {
                Some(file) => Resolution::Content(
                    std::fs::read_to_string(&file)
                        .with_context(|| format!("failed to read {}", file.display()))?,
                ),
                None if ours => Resolution::Ours,
                None => Resolution::Theirs,
            };
            let state = ctx
                .engine
                .resolve_merge(&ctx.user, &name, &path, resolution)
                .await?;
            ctx.emit(&state)
        }
    }
}

/// `worktree`, `index` and `head` name the special trees; anything else is
/// a revision.
fn tree_ref(from: &str) -> TreeRef {
    match from.to_ascii_lowercase().as_str() {
        "worktree" => TreeRef::Worktree,
        "index" => TreeRef::Index,
        "head" => TreeRef::Head,
        _ => TreeRef::Commit(from.to_string()),
    }
}

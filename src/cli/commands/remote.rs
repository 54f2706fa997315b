//! remote, pull and push commands

use std::time::Duration;

use anyhow::Result;
use serde_json::json;

use super::projects::credentials;
use super::Context;
use crate::cli::args::RemoteCommand;
use crate::core::types::RemoteName;
use crate::engine::{AuthUpdate, PullOptions, PushOptions, RemoteSpec, RemoteUpdate};

pub async fn run(command: RemoteCommand, ctx: &Context) -> Result<()> {
    let name = ctx.project().await?;
    let engine = &ctx.engine;
    let user = &ctx.user;
    match command {
        RemoteCommand::List => ctx.emit(&engine.get_remotes(user, &name).await?),
        RemoteCommand::Add {
            name: remote,
            url,
            username,
        } => {
            let spec = RemoteSpec {
                name: RemoteName::new(remote)?,
                url,
                credentials: username.map(credentials).transpose()?,
            };
            ctx.emit(&engine.add_remote(user, &name, spec).await?)
        }
        RemoteCommand::Update { name: remote, url } => {
            let remote = RemoteName::new(remote)?;
            let update = RemoteUpdate {
                url: Some(url),
                auth: None,
            };
            ctx.emit(&engine.update_remote(user, &name, &remote, update).await?)
        }
        RemoteCommand::Auth {
            name: remote,
            username,
            clear,
        } => {
            let remote = RemoteName::new(remote)?;
            let view = match username {
                Some(username) if !clear => {
                    engine
                        .set_remote_auth(user, &name, &remote, credentials(username)?)
                        .await?
                }
                _ => {
                    let update = RemoteUpdate {
                        url: None,
                        auth: Some(AuthUpdate::Clear),
                    };
                    engine.update_remote(user, &name, &remote, update).await?
                }
            };
            ctx.emit(&view)
        }
        RemoteCommand::Remove { name: remote } => {
            let remote = RemoteName::new(remote)?;
            engine.remove_remote(user, &name, &remote).await?;
            ctx.emit(&json!({ "removed": remote }))
        }
    }
}

pub async fn pull(
    ctx: &Context,
    remote: Option<String>,
    track: bool,
    allow_unrelated_histories: bool,
    timeout: Option<u64>,
) -> Result<()> {
    let name = ctx.project().await?;
    let options = PullOptions {
        remote: remote.map(RemoteName::new).transpose()?,
        track,
        allow_unrelated_histories,
        timeout: timeout.map(Duration::from_secs),
    };
    ctx.emit(&ctx.engine.pull(&ctx.user, &name, options).await?)
}

pub async fn push(
    ctx: &Context,
    remote: Option<String>,
    track: bool,
    timeout: Option<u64>,
) -> Result<()> {
    let name = ctx.project().await?;
    let options = PushOptions {
        remote: remote.map(RemoteName::new).transpose()?,
        track,
        timeout: timeout.map(Duration::from_secs),
    };
    ctx.emit(&ctx.engine.push(&ctx.user, &name, options).await?)
}

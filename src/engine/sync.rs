//! engine::sync
//!
//! Remotes and the operations that talk to them: remote configuration,
//! pull and push.
//!
//! A remote lives in two places that must agree: the repository's git
//! config (what transfers use) and the project's registry record (what
//! callers see, plus the key of any stored credentials). Both are changed
//! while holding the project's exclusive lock.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::gate::{gate, requirements};
use super::merge::MergeState;
use super::model::{
    AuthUpdate, PullOptions, PullOutcome, PushOptions, PushOutcome, RemoteSpec, RemoteUpdate,
    RemoteView,
};
use super::{Engine, EngineError};
use crate::core::registry::{Project, Remote};
use crate::core::types::{BranchName, ProjectName, RemoteName, UserId};
use crate::git::{Credentials, Git, GitError, Integration};
use crate::secrets::{remote_key, SecretStore};

/// Reject URLs git would misread.
pub(super) fn validate_url(url: &str) -> Result<(), EngineError> {
    if url.trim().is_empty() {
        return Err(EngineError::InvalidArgument(
            "remote URL cannot be empty".to_string(),
        ));
    }
    if url.starts_with('-') || url.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(EngineError::InvalidArgument(format!("invalid remote URL '{url}'")));
    }
    Ok(())
}

fn view(remote: &Remote) -> RemoteView {
    RemoteView {
        name: remote.name.clone(),
        url: remote.url.clone(),
        has_auth: remote.auth.is_some(),
    }
}

/// Pick the remote for a transfer on `branch`: the requested one, else the
/// branch's upstream, else `origin`.
fn choose_remote(
    git: &Git,
    project: &Project,
    branch: &BranchName,
    requested: Option<RemoteName>,
) -> Result<RemoteName, EngineError> {
    let remote = match requested {
        Some(remote) => remote,
        None => match git.upstream_remote(branch)? {
            Some(remote) => remote,
            None => RemoteName::new("origin")?,
        },
    };
    let configured = project.remote(&remote).is_some()
        || git.remotes()?.iter().any(|r| r.name == remote.as_str());
    if !configured {
        return Err(EngineError::NotFound(format!("remote '{remote}'")));
    }
    Ok(remote)
}

/// Store or clear credentials for `remote`, returning the new auth key.
fn apply_auth(
    secrets: &dyn SecretStore,
    project: &ProjectName,
    remote: &RemoteName,
    current: Option<String>,
    update: Option<AuthUpdate>,
) -> Result<Option<String>, EngineError> {
    match update {
        None => Ok(current),
        Some(AuthUpdate::Set(credentials)) => {
            let key = remote_key(project, remote);
            secrets.set(&key, &credentials.to_secret())?;
            Ok(Some(key))
        }
        Some(AuthUpdate::Clear) => {
            if let Some(key) = current {
                secrets.delete(&key)?;
            }
            Ok(None)
        }
    }
}

impl Engine {
    /// Remotes of a project, ordered as added.
    pub async fn get_remotes(
        &self,
        user: &UserId,
        name: &ProjectName,
    ) -> Result<Vec<RemoteView>, EngineError> {
        debug!(user = %user, project = %name, "remotes");
        let project = self.registry.get(name)?;
        Ok(project.remotes.iter().map(view).collect())
    }

    /// Add a remote, storing its credentials if given.
    pub async fn add_remote(
        &self,
        user: &UserId,
        name: &ProjectName,
        spec: RemoteSpec,
    ) -> Result<RemoteView, EngineError> {
        validate_url(&spec.url)?;
        let registry = self.registry.clone();
        let secrets = Arc::clone(&self.secrets);
        let remote_name = spec.name.clone();

        let added = self
            .exclusive(name, move |git, project| {
                gate(git, &requirements::REMOTE_EDIT)?;
                if project.remote(&spec.name).is_some() {
                    return Err(EngineError::AlreadyExists(format!("remote '{}'", spec.name)));
                }
                git.add_remote(&spec.name, &spec.url).map_err(|e| match e {
                    GitError::AlreadyExists { .. } => {
                        EngineError::AlreadyExists(format!("remote '{}'", spec.name))
                    }
                    other => other.into(),
                })?;

                let auth = apply_auth(
                    secrets.as_ref(),
                    &project.name,
                    &spec.name,
                    None,
                    spec.credentials.map(AuthUpdate::Set),
                )?;
                let remote = Remote {
                    name: spec.name,
                    url: spec.url,
                    auth,
                };
                let stored = remote.clone();
                registry.update(&project.name, move |p| p.remotes.push(stored))?;
                Ok(view(&remote))
            })
            .await?;
        info!(user = %user, project = %name, remote = %remote_name, "remote added");
        Ok(added)
    }

    /// Change a remote's URL and/or credentials.
    pub async fn update_remote(
        &self,
        user: &UserId,
        name: &ProjectName,
        remote: &RemoteName,
        update: RemoteUpdate,
    ) -> Result<RemoteView, EngineError> {
        if let Some(url) = &update.url {
            validate_url(url)?;
        }
        let registry = self.registry.clone();
        let secrets = Arc::clone(&self.secrets);
        let target = remote.clone();

        let updated = self
            .exclusive(name, move |git, project| {
                gate(git, &requirements::REMOTE_EDIT)?;
                let current = project
                    .remote(&target)
                    .cloned()
                    .ok_or_else(|| EngineError::NotFound(format!("remote '{target}'")))?;
                if let Some(url) = &update.url {
                    git.set_remote_url(&target, url)?;
                }
                let auth = apply_auth(
                    secrets.as_ref(),
                    &project.name,
                    &target,
                    current.auth,
                    update.auth,
                )?;
                let remote = Remote {
                    name: target.clone(),
                    url: update.url.unwrap_or(current.url),
                    auth,
                };
                let stored = remote.clone();
                registry.update(&project.name, move |p| {
                    if let Some(slot) = p.remotes.iter_mut().find(|r| r.name == stored.name) {
                        *slot = stored;
                    }
                })?;
                Ok(view(&remote))
            })
            .await?;
        info!(user = %user, project = %name, remote = %remote, "remote updated");
        Ok(updated)
    }

    /// Store credentials for a remote.
    pub async fn set_remote_auth(
        &self,
        user: &UserId,
        name: &ProjectName,
        remote: &RemoteName,
        credentials: Credentials,
    ) -> Result<RemoteView, EngineError> {
        let update = RemoteUpdate {
            url: None,
            auth: Some(AuthUpdate::Set(credentials)),
        };
        self.update_remote(user, name, remote, update).await
    }

    /// Remove a remote, its remote-tracking branches and its credentials.
    pub async fn remove_remote(
        &self,
        user: &UserId,
        name: &ProjectName,
        remote: &RemoteName,
    ) -> Result<(), EngineError> {
        let registry = self.registry.clone();
        let secrets = Arc::clone(&self.secrets);
        let target = remote.clone();

        self.exclusive(name, move |git, project| {
            gate(git, &requirements::REMOTE_EDIT)?;
            let current = project
                .remote(&target)
                .cloned()
                .ok_or_else(|| EngineError::NotFound(format!("remote '{target}'")))?;
            match git.remove_remote(&target) {
                Ok(()) => {}
                // already gone from git config; the record is still removed
                Err(GitError::RefNotFound { .. }) | Err(GitError::ObjectNotFound { .. }) => {
                    warn!(project = %project.name, remote = %target, "remote missing from repository config");
                }
                Err(e) => return Err(e.into()),
            }
            if let Some(key) = &current.auth {
                secrets.delete(key)?;
            }
            registry.update(&project.name, |p| p.remotes.retain(|r| r.name != target))?;
            Ok(())
        })
        .await?;
        info!(user = %user, project = %name, remote = %remote, "remote removed");
        Ok(())
    }

    /// Fetch the remote and integrate its copy of the current branch.
    ///
    /// Requires a clean tracked tree. Fast-forwards when possible, otherwise
    /// merges; a conflicted merge is left in progress and reported in the
    /// outcome rather than as an error.
    ///
    /// # Errors
    ///
    /// - [`EngineError::UncommittedChanges`] if tracked files have changes
    /// - [`EngineError::UnrelatedHistories`] if the histories share no
    ///   commit and `allow_unrelated_histories` is not set
    /// - [`EngineError::Timeout`] if the fetch did not finish in time
    pub async fn pull(
        &self,
        user: &UserId,
        name: &ProjectName,
        options: PullOptions,
    ) -> Result<PullOutcome, EngineError> {
        let PullOptions {
            remote,
            track,
            allow_unrelated_histories,
            timeout,
        } = options;

        let outcome = self
            .network(name, "pull", timeout, move |git, project, network| {
                let gated = gate(git, &requirements::INTEGRATE)?;
                let branch = gated.branch()?.clone();
                let remote = choose_remote(git, project, &branch, remote)?;

                git.fetch(&remote, &network.transfer(project, &remote)?)?;
                let theirs = git
                    .remote_tracking_tip(&remote, &branch)?
                    .ok_or_else(|| EngineError::NotFound(format!("branch '{remote}/{branch}'")))?;

                if let Some(head) = &gated.head {
                    if !allow_unrelated_histories && git.merge_base(head, &theirs)?.is_none() {
                        return Err(EngineError::UnrelatedHistories);
                    }
                }
                // past this point the work is local and runs to completion
                if network.is_cancelled() {
                    return Err(EngineError::Timeout("pull".to_string()));
                }

                let message = format!("Merge branch '{branch}' of {remote}");
                let integration = git.integrate(&theirs, &message)?;
                if track {
                    git.set_upstream(&branch, remote.as_str())?;
                }
                Ok(PullOutcome {
                    merge: MergeState::load(git)?,
                    remote,
                    branch,
                    integration,
                })
            })
            .await?;

        match &outcome.integration {
            Integration::Conflicted { paths } => warn!(
                user = %user,
                project = %name,
                remote = %outcome.remote,
                conflicts = paths.len(),
                "pull left conflicts to resolve"
            ),
            integration => info!(
                user = %user,
                project = %name,
                remote = %outcome.remote,
                ?integration,
                "pulled"
            ),
        }
        Ok(outcome)
    }

    /// Push the current branch to a remote. Never forces.
    ///
    /// # Errors
    ///
    /// - [`EngineError::NonFastForward`] if the remote has diverged
    /// - [`EngineError::Timeout`] if the push did not finish in time
    pub async fn push(
        &self,
        user: &UserId,
        name: &ProjectName,
        options: PushOptions,
    ) -> Result<PushOutcome, EngineError> {
        let PushOptions {
            remote,
            track,
            timeout,
        } = options;

        let outcome = self
            .network(name, "push", timeout, move |git, project, network| {
                let gated = gate(git, &requirements::PUBLISH)?;
                let branch = gated.branch()?.clone();
                let head = gated.head()?.clone();
                let remote = choose_remote(git, project, &branch, remote)?;

                git.push(&remote, &branch, &network.transfer(project, &remote)?)?;
                if track {
                    git.set_upstream(&branch, remote.as_str())?;
                }
                Ok(PushOutcome {
                    remote,
                    branch,
                    head,
                })
            })
            .await?;

        info!(
            user = %user,
            project = %name,
            remote = %outcome.remote,
            branch = %outcome.branch,
            head = %outcome.head.short(7),
            "pushed"
        );
        Ok(outcome)
    }
}

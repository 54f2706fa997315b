//! git::remote
//!
//! Remote configuration and network transfers (clone, fetch, push) plus
//! integration of fetched commits into the current branch.
//!
//! # Cancellation
//!
//! Every transfer takes a [`Transfer`] carrying a `CancellationToken`.
//! Progress callbacks return `false` once it is tripped, which makes
//! libgit2 abort the transfer; the error is then reported as
//! [`GitError::Cancelled`]. Integration ([`Git::integrate`]) is local and
//! never cancelled part-way.
//!
//! # Credentials
//!
//! When a [`Credentials`] pair is supplied it answers user/password
//! challenges. Otherwise the ssh agent and the default credential are
//! tried. A rejected credential is not offered twice.

use std::cell::RefCell;
use std::path::Path;

use git2::build::CheckoutBuilder;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::interface::{from_git2_oid, to_git2, Git, GitError};
use crate::core::types::{BranchName, Oid, RemoteName};

/// Username and token for a remote.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub token: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Parse the stored `username:token` form.
    pub fn parse(secret: &str) -> Option<Self> {
        let (username, token) = secret.split_once(':')?;
        if username.is_empty() {
            return None;
        }
        Some(Self {
            username: username.to_string(),
            token: token.to_string(),
        })
    }

    /// The stored `username:token` form.
    pub fn to_secret(&self) -> String {
        format!("{}:{}", self.username, self.token)
    }
}

/// Per-transfer options.
#[derive(Debug, Clone, Default)]
pub struct Transfer {
    pub cancel: CancellationToken,
    pub credentials: Option<Credentials>,
}

impl Transfer {
    fn check(&self) -> Result<(), GitError> {
        if self.cancel.is_cancelled() {
            Err(GitError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn error(&self, err: git2::Error, context: &str) -> GitError {
        if self.cancel.is_cancelled() {
            GitError::Cancelled
        } else {
            GitError::from_git2(err, context)
        }
    }

    fn callbacks(&self) -> git2::RemoteCallbacks<'_> {
        let mut callbacks = git2::RemoteCallbacks::new();
        let mut attempts = 0u32;
        callbacks.credentials(move |_url, username_from_url, allowed| {
            attempts += 1;
            if attempts > 1 {
                return Err(git2::Error::from_str("credentials rejected by remote"));
            }
            if allowed.is_user_pass_plaintext() {
                if let Some(creds) = &self.credentials {
                    return git2::Cred::userpass_plaintext(&creds.username, &creds.token);
                }
            }
            if allowed.is_ssh_key() {
                if let Some(user) = username_from_url {
                    return git2::Cred::ssh_key_from_agent(user);
                }
            }
            git2::Cred::default()
        });
        let cancel = &self.cancel;
        callbacks.transfer_progress(move |_| !cancel.is_cancelled());
        callbacks.sideband_progress(move |_| !cancel.is_cancelled());
        callbacks
    }
}

/// A configured remote as git sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteInfo {
    pub name: String,
    pub url: String,
}

/// Result of integrating a fetched commit into the current branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Integration {
    UpToDate,
    FastForward { head: Oid },
    Merged { head: Oid },
    Conflicted { paths: Vec<String> },
}

impl Git {
    /// Clone `url` into `path`.
    pub fn clone_from(
        url: &str,
        path: &Path,
        branch: Option<&BranchName>,
        transfer: &Transfer,
    ) -> Result<Self, GitError> {
        transfer.check()?;
        let mut fetch = git2::FetchOptions::new();
        fetch.remote_callbacks(transfer.callbacks());

        let mut builder = git2::build::RepoBuilder::new();
        builder.fetch_options(fetch);
        if let Some(branch) = branch {
            builder.branch(branch.as_str());
        }
        builder
            .clone(url, path)
            .map_err(|e| transfer.error(e, url))?;
        Git::open(path)
    }

    /// Configured remotes, ordered by name.
    pub fn remotes(&self) -> Result<Vec<RemoteInfo>, GitError> {
        let names = self.repo.remotes()?;
        let mut remotes = Vec::new();
        for name in names.iter().flatten() {
            let remote = self.repo.find_remote(name)?;
            remotes.push(RemoteInfo {
                name: name.to_string(),
                url: remote.url().unwrap_or_default().to_string(),
            });
        }
        remotes.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(remotes)
    }

    fn find_remote(&self, name: &RemoteName) -> Result<git2::Remote<'_>, GitError> {
        self.repo
            .find_remote(name.as_str())
            .map_err(|e| GitError::from_git2(e, &format!("refs/remotes/{name}")))
    }

    /// Add a remote with the default fetch refspec.
    pub fn add_remote(&self, name: &RemoteName, url: &str) -> Result<(), GitError> {
        self.repo
            .remote(name.as_str(), url)
            .map_err(|e| GitError::from_git2(e, name.as_str()))?;
        Ok(())
    }

    /// Remove a remote and its remote-tracking branches.
    pub fn remove_remote(&self, name: &RemoteName) -> Result<(), GitError> {
        self.find_remote(name)?;
        self.repo
            .remote_delete(name.as_str())
            .map_err(|e| GitError::from_git2(e, name.as_str()))
    }

    /// Change a remote's URL.
    pub fn set_remote_url(&self, name: &RemoteName, url: &str) -> Result<(), GitError> {
        self.find_remote(name)?;
        self.repo
            .remote_set_url(name.as_str(), url)
            .map_err(|e| GitError::from_git2(e, name.as_str()))
    }

    /// Tip of `remote/branch` as last fetched.
    pub fn remote_tracking_tip(
        &self,
        remote: &RemoteName,
        branch: &BranchName,
    ) -> Result<Option<Oid>, GitError> {
        let refname = format!("refs/remotes/{remote}/{branch}");
        match self.repo.refname_to_id(&refname) {
            Ok(id) => Ok(Some(from_git2_oid(id)?)),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(GitError::from_git2(e, &refname)),
        }
    }

    /// Fetch all branches of `remote` with its configured refspecs.
    pub fn fetch(&self, remote: &RemoteName, transfer: &Transfer) -> Result<(), GitError> {
        transfer.check()?;
        let mut handle = self.find_remote(remote)?;
        let mut opts = git2::FetchOptions::new();
        opts.remote_callbacks(transfer.callbacks());
        handle
            .fetch::<&str>(&[], Some(&mut opts), None)
            .map_err(|e| transfer.error(e, remote.as_str()))
    }

    /// Push local `branch` to the same name on `remote`.
    ///
    /// Never forces. A remote that has diverged yields
    /// [`GitError::NotFastForward`].
    pub fn push(
        &self,
        remote: &RemoteName,
        branch: &BranchName,
        transfer: &Transfer,
    ) -> Result<(), GitError> {
        transfer.check()?;
        let mut handle = self.find_remote(remote)?;
        let refspec = format!("refs/heads/{branch}:refs/heads/{branch}");
        let rejection: RefCell<Option<String>> = RefCell::new(None);

        {
            let mut callbacks = transfer.callbacks();
            callbacks.push_update_reference(|_refname, status| {
                if let Some(message) = status {
                    *rejection.borrow_mut() = Some(message.to_string());
                }
                Ok(())
            });
            let mut opts = git2::PushOptions::new();
            opts.remote_callbacks(callbacks);
            handle
                .push(&[refspec.as_str()], Some(&mut opts))
                .map_err(|e| transfer.error(e, remote.as_str()))?;
        }

        match rejection.into_inner() {
            None => Ok(()),
            Some(message) if is_non_fast_forward(&message) => {
                Err(GitError::NotFastForward { message })
            }
            Some(message) => Err(GitError::Rejected { message }),
        }
    }

    /// Merge `theirs` into the current branch.
    ///
    /// Fast-forwards when possible. Otherwise performs a merge; a clean
    /// merge is committed with `message`, a conflicted one is left in
    /// progress with the conflicted paths reported.
    pub fn integrate(&self, theirs: &Oid, message: &str) -> Result<Integration, GitError> {
        let their_id = to_git2(theirs)?;
        let annotated = self
            .repo
            .find_annotated_commit(their_id)
            .map_err(|e| GitError::from_git2(e, theirs.as_str()))?;
        let (analysis, _) = self.repo.merge_analysis(&[&annotated])?;

        if analysis.is_up_to_date() {
            return Ok(Integration::UpToDate);
        }

        if analysis.is_unborn() || analysis.is_fast_forward() {
            self.fast_forward(their_id)?;
            return Ok(Integration::FastForward {
                head: theirs.clone(),
            });
        }

        let mut checkout = CheckoutBuilder::new();
        checkout.safe().allow_conflicts(true).conflict_style_merge(true);
        self.repo
            .merge(&[&annotated], None, Some(&mut checkout))
            .map_err(|e| GitError::from_git2(e, theirs.as_str()))?;

        let conflicts = self.conflicted_paths()?;
        if !conflicts.is_empty() {
            return Ok(Integration::Conflicted { paths: conflicts });
        }

        let head = self.commit(message)?;
        Ok(Integration::Merged { head })
    }

    fn fast_forward(&self, target: git2::Oid) -> Result<(), GitError> {
        let commit = self.repo.find_commit(target)?;
        let refname = self
            .repo
            .find_reference("HEAD")?
            .symbolic_target()
            .map(String::from)
            .ok_or_else(|| GitError::RefNotFound {
                refname: "HEAD".to_string(),
            })?;

        let unborn = self.head_commit()?.is_none();
        let mut checkout = CheckoutBuilder::new();
        if unborn {
            checkout.force();
        } else {
            checkout.safe();
        }
        self.repo
            .checkout_tree(commit.as_object(), Some(&mut checkout))
            .map_err(|e| GitError::from_git2(e, &refname))?;
        self.repo
            .reference(&refname, target, true, "gitdeck: fast-forward")
            .map_err(|e| GitError::from_git2(e, &refname))?;
        Ok(())
    }
}

fn is_non_fast_forward(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    message.contains("non-fast-forward")
        || message.contains("fetch first")
        || message.contains("not present locally")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_parse_roundtrip() {
        let creds = Credentials::parse("alice:s3cr:et").unwrap();
        assert_eq!(creds.username, "alice");
        assert_eq!(creds.token, "s3cr:et");
        assert_eq!(creds.to_secret(), "alice:s3cr:et");
    }

    #[test]
    fn credentials_require_username() {
        assert!(Credentials::parse(":token").is_none());
        assert!(Credentials::parse("no-separator").is_none());
    }

    #[test]
    fn credentials_debug_redacts_token() {
        let creds = Credentials {
            username: "alice".into(),
            token: "hunter2".into(),
        };
        let debug = format!("{creds:?}");
        assert!(debug.contains("alice"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn cancelled_transfer_fails_before_starting() {
        let transfer = Transfer::default();
        transfer.cancel.cancel();
        assert!(matches!(transfer.check(), Err(GitError::Cancelled)));
    }

    #[test]
    fn rejection_messages_classified() {
        assert!(is_non_fast_forward("rejected: non-fast-forward"));
        assert!(is_non_fast_forward("Updates were rejected (fetch first)"));
        assert!(!is_non_fast_forward("hook declined"));
    }
}

//! engine::workspace
//!
//! Operations on a project's working tree and history: status, branches,
//! files, staging, commits, diffs, and merge resolution.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use super::gate::{gate, requirements};
use super::merge::{ConflictResolver, MergeState, Resolution};
use super::model::{
    BranchStatus, CommitDetail, CommitPage, CommitQuery, DiffType, ProjectStatus, RemoteStatus,
    StatusOptions, TreeRef,
};
use super::{Engine, EngineError, ErrorKind, Network};
use crate::core::registry::Project;
use crate::core::config::GlobalConfig;
use crate::core::types::{BranchName, ProjectName, UserId};
use crate::git::{
    BranchInfo, BranchKind, CommitInfo, DiffTarget, FileDiff, FileEntry, FileSource, Git,
};

fn resolve_source(git: &Git, tree: &TreeRef) -> Result<FileSource, EngineError> {
    Ok(match tree {
        TreeRef::Worktree => FileSource::Worktree,
        TreeRef::Index => FileSource::Index,
        TreeRef::Head => FileSource::Head,
        TreeRef::Commit(spec) => FileSource::Commit(git.resolve_commit(spec)?),
    })
}

fn resolve_diff(git: &Git, diff: &DiffType) -> Result<DiffTarget, EngineError> {
    Ok(match diff {
        DiffType::Unstaged => DiffTarget::Unstaged,
        DiffType::Staged => DiffTarget::Staged,
        DiffType::Commit { from, to } => DiffTarget::Commits {
            from: from.as_deref().map(|f| git.resolve_commit(f)).transpose()?,
            to: git.resolve_commit(to)?,
        },
    })
}

/// Fetch the current branch's upstream and compare against it.
///
/// `None` when detached or without an upstream. Transport and auth
/// failures are recorded in the result instead of failing.
fn remote_status(
    git: &Git,
    project: &Project,
    network: &Network,
) -> Result<Option<RemoteStatus>, EngineError> {
    let Some(branch) = git.current_branch()? else {
        return Ok(None);
    };
    let Some(remote) = git.upstream_remote(&branch)? else {
        return Ok(None);
    };

    let unreachable = match git.fetch(&remote, &network.transfer(project, &remote)?) {
        Ok(()) => None,
        Err(e) => {
            let e = EngineError::from(e);
            if !matches!(e.kind(), ErrorKind::Unreachable | ErrorKind::PermissionDenied) {
                return Err(e);
            }
            warn!(project = %project.name, remote = %remote, error = %e, "remote unreachable, using last fetch");
            Some(e.to_string())
        }
    };

    let (ahead, behind, upstream) = match (git.try_head_oid()?, git.upstream_of(&branch)?) {
        (Some(head), Some((upstream, tip))) => {
            let (ahead, behind) = git.ahead_behind(&head, &tip)?;
            (ahead, behind, Some(upstream))
        }
        (_, upstream) => (0, 0, upstream.map(|(short, _)| short)),
    };
    Ok(Some(RemoteStatus {
        upstream,
        ahead,
        behind,
        unreachable,
    }))
}

fn non_empty(paths: &[String]) -> Result<(), EngineError> {
    if paths.is_empty() {
        Err(EngineError::InvalidArgument("no paths given".to_string()))
    } else {
        Ok(())
    }
}

impl Engine {
    /// Status of a project's working tree and merge state.
    ///
    /// With `include_remote` the upstream is fetched first and ahead/behind
    /// counts are reported. An unreachable remote does not fail the call:
    /// the remote section records why and the counts fall back to the last
    /// fetch.
    pub async fn get_status(
        &self,
        user: &UserId,
        name: &ProjectName,
        options: StatusOptions,
    ) -> Result<ProjectStatus, EngineError> {
        debug!(user = %user, project = %name, include_remote = options.include_remote, "status");
        if !options.include_remote {
            return self
                .shared(name, |git, _| {
                    Ok(ProjectStatus {
                        snapshot: git.status()?,
                        merge: MergeState::load(git)?,
                        remote: None,
                    })
                })
                .await;
        }

        self.network(name, "status", options.timeout, |git, project, network| {
            Ok(ProjectStatus {
                remote: remote_status(git, project, network)?,
                snapshot: git.status()?,
                merge: MergeState::load(git)?,
            })
        })
        .await
    }

    /// Local branches, or remote-tracking branches when `remote` is set.
    pub async fn get_branches(
        &self,
        user: &UserId,
        name: &ProjectName,
        remote: bool,
    ) -> Result<Vec<BranchInfo>, EngineError> {
        debug!(user = %user, project = %name, remote, "branches");
        let kind = if remote { BranchKind::Remote } else { BranchKind::Local };
        self.shared(name, move |git, _| Ok(git.branches(kind)?)).await
    }

    /// How far `branch` is ahead of and behind the current branch.
    pub async fn get_branch_status(
        &self,
        user: &UserId,
        name: &ProjectName,
        branch: &BranchName,
    ) -> Result<BranchStatus, EngineError> {
        debug!(user = %user, project = %name, branch = %branch, "branch status");
        let branch = branch.clone();
        self.shared(name, move |git, _| {
            let gated = gate(git, &requirements::HISTORY)?;
            let tip = git
                .branch_tip(&branch)?
                .ok_or_else(|| EngineError::NotFound(format!("branch '{branch}'")))?;
            let (ahead, behind) = git.ahead_behind(&tip, gated.head()?)?;
            Ok(BranchStatus {
                branch,
                commit: tip,
                ahead,
                behind,
            })
        })
        .await
    }

    /// Check out `branch`, creating it at HEAD when `create` is set.
    ///
    /// # Errors
    ///
    /// - [`EngineError::UncommittedChanges`] if tracked files have changes
    /// - [`EngineError::NotFound`] if the branch does not exist and
    ///   `create` is not set
    pub async fn set_branch(
        &self,
        user: &UserId,
        name: &ProjectName,
        branch: &BranchName,
        create: bool,
    ) -> Result<(), EngineError> {
        let target = branch.clone();
        let switched = self
            .exclusive(name, move |git, _| {
                let gated = gate(git, &requirements::BRANCH_SWITCH)?;
                let exists = git.branch_tip(&target)?.is_some();
                match (exists, create) {
                    (true, true) => {
                        return Err(EngineError::AlreadyExists(format!("branch '{target}'")))
                    }
                    (false, false) => {
                        return Err(EngineError::NotFound(format!("branch '{target}'")))
                    }
                    (true, false) if gated.branch.as_ref() == Some(&target) => return Ok(false),
                    _ => {}
                }
                git.switch_branch(&target, create)?;
                Ok(true)
            })
            .await?;
        if switched {
            info!(user = %user, project = %name, branch = %branch, create, "branch checked out");
        }
        Ok(())
    }

    /// Delete a local branch.
    ///
    /// # Errors
    ///
    /// - [`EngineError::CurrentBranch`] for the checked-out branch
    /// - [`EngineError::NotFullyMerged`] unless `force` or its commits are
    ///   reachable from another branch
    pub async fn delete_branch(
        &self,
        user: &UserId,
        name: &ProjectName,
        branch: &BranchName,
        force: bool,
    ) -> Result<(), EngineError> {
        let target = branch.clone();
        self.exclusive(name, move |git, _| {
            let gated = gate(git, &requirements::WORKTREE_EDIT)?;
            if gated.branch.as_ref() == Some(&target) {
                return Err(EngineError::CurrentBranch(target));
            }
            if git.branch_tip(&target)?.is_none() {
                return Err(EngineError::NotFound(format!("branch '{target}'")));
            }
            if !force && !git.is_merged_elsewhere(&target)? {
                return Err(EngineError::NotFullyMerged(target));
            }
            Ok(git.delete_branch(&target)?)
        })
        .await?;
        info!(user = %user, project = %name, branch = %branch, force, "branch deleted");
        Ok(())
    }

    /// Commit the staged changes, or conclude a merge whose conflicts are
    /// all resolved.
    ///
    /// # Errors
    ///
    /// - [`EngineError::NothingStaged`] outside a merge with nothing staged
    /// - [`EngineError::MergeInProgress`] while conflicts remain
    pub async fn commit(
        &self,
        user: &UserId,
        name: &ProjectName,
        message: &str,
    ) -> Result<CommitInfo, EngineError> {
        if message.trim().is_empty() {
            return Err(EngineError::InvalidArgument(
                "commit message cannot be empty".to_string(),
            ));
        }
        let message = message.to_string();
        let commit = self
            .exclusive(name, move |git, _| {
                let merge = MergeState::load(git)?;
                merge.require_committable()?;
                if !merge.is_in_progress() && !git.worktree_status(false)?.has_staged() {
                    return Err(EngineError::NothingStaged);
                }
                let oid = git.commit(&message)?;
                Ok(git.commit_info(&oid)?)
            })
            .await?;
        info!(
            user = %user,
            project = %name,
            commit = %commit.oid.short(7),
            parents = commit.parents.len(),
            "committed"
        );
        Ok(commit)
    }

    /// A commit with its change summary. `reference` is any revision
    /// expression.
    pub async fn get_commit(
        &self,
        user: &UserId,
        name: &ProjectName,
        reference: &str,
    ) -> Result<CommitDetail, EngineError> {
        debug!(user = %user, project = %name, reference, "commit");
        let reference = reference.to_string();
        self.shared(name, move |git, _| {
            let oid = git.resolve_commit(&reference)?;
            let info = git.commit_info(&oid)?;
            let (stats, files) = git.commit_stats(&oid)?;
            Ok(CommitDetail { info, stats, files })
        })
        .await
    }

    /// One page of first-parent history, newest first.
    pub async fn get_commits(
        &self,
        user: &UserId,
        name: &ProjectName,
        query: CommitQuery,
    ) -> Result<CommitPage, EngineError> {
        let limit = match query.limit {
            Some(0) => {
                return Err(EngineError::InvalidArgument(
                    "limit must be at least 1".to_string(),
                ))
            }
            Some(limit) => limit.min(GlobalConfig::MAX_PAGE_SIZE),
            None => self.config.page_size(),
        };
        debug!(user = %user, project = %name, limit, "commits");

        self.shared(name, move |git, _| {
            let before = query
                .before
                .as_deref()
                .map(|spec| git.resolve_commit(spec))
                .transpose()?;
            let mut commits = git.log(before.as_ref(), limit + 1)?;
            let next = if commits.len() > limit {
                commits.truncate(limit);
                commits.last().map(|c| c.oid.clone())
            } else {
                None
            };
            Ok(CommitPage { commits, next })
        })
        .await
    }

    /// Every tracked, changed or untracked file with its status.
    pub async fn get_files(
        &self,
        user: &UserId,
        name: &ProjectName,
    ) -> Result<BTreeMap<String, FileEntry>, EngineError> {
        debug!(user = %user, project = %name, "files");
        self.shared(name, |git, _| {
            Ok(git
                .files()?
                .into_iter()
                .map(|entry| (entry.path.clone(), entry))
                .collect())
        })
        .await
    }

    /// Content of `path` from the working tree, index, HEAD or a commit.
    pub async fn get_file(
        &self,
        user: &UserId,
        name: &ProjectName,
        path: &str,
        tree: TreeRef,
    ) -> Result<String, EngineError> {
        debug!(user = %user, project = %name, path, ?tree, "file");
        let path = path.to_string();
        self.shared(name, move |git, _| {
            let source = resolve_source(git, &tree)?;
            Ok(git.read_file(&path, &source)?)
        })
        .await
    }

    /// Stage `paths`.
    pub async fn stage_files(
        &self,
        user: &UserId,
        name: &ProjectName,
        paths: Vec<String>,
    ) -> Result<(), EngineError> {
        non_empty(&paths)?;
        let count = paths.len();
        self.exclusive(name, move |git, _| {
            gate(git, &requirements::WORKTREE_EDIT)?;
            Ok(git.stage(&paths)?)
        })
        .await?;
        info!(user = %user, project = %name, count, "staged");
        Ok(())
    }

    /// Unstage `paths`, or everything when `None`.
    pub async fn unstage_files(
        &self,
        user: &UserId,
        name: &ProjectName,
        paths: Option<Vec<String>>,
    ) -> Result<(), EngineError> {
        if let Some(paths) = &paths {
            non_empty(paths)?;
        }
        let all = paths.is_none();
        self.exclusive(name, move |git, _| {
            gate(git, &requirements::WORKTREE_EDIT)?;
            Ok(git.unstage(paths.as_deref())?)
        })
        .await?;
        info!(user = %user, project = %name, all, "unstaged");
        Ok(())
    }

    /// Discard changes to `path`, restoring it from HEAD.
    pub async fn revert_file(
        &self,
        user: &UserId,
        name: &ProjectName,
        path: &str,
    ) -> Result<(), EngineError> {
        let target = path.to_string();
        self.exclusive(name, move |git, _| {
            gate(git, &requirements::WORKTREE_EDIT)?;
            Ok(git.revert_path(&target)?)
        })
        .await?;
        info!(user = %user, project = %name, path, "reverted");
        Ok(())
    }

    /// Structured diff of one file.
    pub async fn get_file_diff(
        &self,
        user: &UserId,
        name: &ProjectName,
        path: &str,
        diff: DiffType,
    ) -> Result<FileDiff, EngineError> {
        debug!(user = %user, project = %name, path, ?diff, "diff");
        let path = path.to_string();
        self.shared(name, move |git, _| {
            let target = resolve_diff(git, &diff)?;
            Ok(git.diff_file(&path, &target)?)
        })
        .await
    }

    /// Abandon the merge in progress, restoring the pre-merge state.
    pub async fn abort_merge(&self, user: &UserId, name: &ProjectName) -> Result<(), EngineError> {
        self.exclusive(name, |git, _| {
            gate(git, &requirements::MERGE_RESOLUTION)?;
            ConflictResolver::new(git).abort()
        })
        .await?;
        info!(user = %user, project = %name, "merge aborted");
        Ok(())
    }

    /// Resolve one conflicted path and stage the result.
    ///
    /// Returns the merge state afterwards; once no paths remain the merge
    /// is concluded with [`commit`](Self::commit).
    pub async fn resolve_merge(
        &self,
        user: &UserId,
        name: &ProjectName,
        path: &str,
        resolution: Resolution,
    ) -> Result<MergeState, EngineError> {
        let target = path.to_string();
        let state = self
            .exclusive(name, move |git, _| {
                gate(git, &requirements::MERGE_RESOLUTION)?;
                ConflictResolver::new(git).resolve(&target, &resolution)
            })
            .await?;
        info!(
            user = %user,
            project = %name,
            path,
            remaining = state.conflicted().len(),
            "conflict resolved"
        );
        Ok(state)
    }
}

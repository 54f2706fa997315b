//! git::interface
//!
//! Git interface implementation using git2.
//!
//! This module provides the **single doorway** to all Git operations in
//! gitdeck. Everything above it works with [`Git`] and the plain data types
//! defined here; nothing above it imports `git2`.
//!
//! # Error Handling
//!
//! Git errors are categorized into typed variants:
//! - [`GitError::NotARepo`]: No repository at the project path
//! - [`GitError::RefNotFound`]: Requested ref does not exist
//! - [`GitError::PathNotFound`]: Path absent from the requested tree
//! - [`GitError::NotFastForward`]: Push rejected because the remote diverged
//! - [`GitError::Network`]: Transport failure talking to a remote
//! - [`GitError::Cancelled`]: A transfer was cancelled by its caller
//!
//! # Example
//!
//! ```ignore
//! use gitdeck::git::Git;
//! use std::path::Path;
//!
//! let git = Git::open(Path::new("/data/gitdeck/projects/demo"))?;
//! let status = git.status()?;
//! println!("on {:?}, {} staged", status.branch, status.staged.len());
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use git2::build::CheckoutBuilder;
use serde::Serialize;
use thiserror::Error;

use crate::core::types::{BranchName, Oid, RemoteName, TypeError, UtcTimestamp};

/// Errors from Git operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// No repository at the given path.
    #[error("not a git repository: {path}")]
    NotARepo {
        /// The path that was opened
        path: PathBuf,
    },

    /// Repository is bare (no working directory).
    #[error("bare repository not supported")]
    BareRepo,

    /// Requested ref does not exist.
    #[error("ref not found: {refname}")]
    RefNotFound {
        /// The ref that was not found
        refname: String,
    },

    /// Object not found in repository.
    #[error("object not found: {oid}")]
    ObjectNotFound {
        /// The OID that was not found
        oid: String,
    },

    /// Path not present in the requested tree.
    #[error("path not found: {path}")]
    PathNotFound {
        /// The repository-relative path
        path: String,
    },

    /// Path escapes the working tree or is otherwise unusable.
    #[error("invalid path: {path}")]
    InvalidPath {
        /// The offending path
        path: String,
    },

    /// A ref or remote that must be new already exists.
    #[error("already exists: {name}")]
    AlreadyExists {
        /// The existing name
        name: String,
    },

    /// Invalid object id format.
    #[error("invalid object id: {oid}")]
    InvalidOid {
        /// The invalid OID string
        oid: String,
    },

    /// Invalid ref name format.
    #[error("invalid ref name: {message}")]
    InvalidRefName {
        /// Description of the problem
        message: String,
    },

    /// File content is not valid UTF-8.
    #[error("file is not valid UTF-8: {path}")]
    InvalidUtf8 {
        /// The file that failed to decode
        path: String,
    },

    /// No committer identity is configured.
    #[error("no commit identity configured (set user.name/user.email or [author] in config)")]
    NoIdentity,

    /// Push rejected because the remote has commits we do not.
    #[error("push rejected, remote has diverged: {message}")]
    NotFastForward {
        /// Rejection reason from the remote
        message: String,
    },

    /// Push rejected by the remote for another reason.
    #[error("push rejected: {message}")]
    Rejected {
        /// Rejection reason from the remote
        message: String,
    },

    /// Remote authentication failed.
    #[error("authentication failed: {message}")]
    Auth {
        /// Description of the error
        message: String,
    },

    /// Transport failure talking to a remote.
    #[error("network error: {message}")]
    Network {
        /// Description of the error
        message: String,
    },

    /// A transfer was cancelled before it completed.
    #[error("transfer cancelled")]
    Cancelled,

    /// Repository files are locked by another process.
    #[error("repository is locked: {message}")]
    Locked {
        /// Description of the error
        message: String,
    },

    /// Permission or filesystem error.
    #[error("repository access error: {message}")]
    AccessError {
        /// Description of the error
        message: String,
    },

    /// Internal git2 error.
    #[error("git error: {message}")]
    Internal {
        /// The error message
        message: String,
    },
}

impl GitError {
    /// Create a GitError from a git2::Error with richer context.
    pub(super) fn from_git2(err: git2::Error, context: &str) -> Self {
        match err.code() {
            git2::ErrorCode::NotFound => {
                if context.starts_with("refs/") || context == "HEAD" {
                    GitError::RefNotFound {
                        refname: context.to_string(),
                    }
                } else {
                    GitError::ObjectNotFound {
                        oid: context.to_string(),
                    }
                }
            }
            git2::ErrorCode::Exists => GitError::AlreadyExists {
                name: context.to_string(),
            },
            git2::ErrorCode::InvalidSpec => GitError::InvalidOid {
                oid: context.to_string(),
            },
            git2::ErrorCode::Locked => GitError::Locked {
                message: err.message().to_string(),
            },
            git2::ErrorCode::NotFastForward => GitError::NotFastForward {
                message: err.message().to_string(),
            },
            git2::ErrorCode::Auth => GitError::Auth {
                message: err.message().to_string(),
            },
            git2::ErrorCode::Certificate => GitError::Network {
                message: err.message().to_string(),
            },
            _ => match err.class() {
                git2::ErrorClass::Net
                | git2::ErrorClass::Http
                | git2::ErrorClass::Ssh
                | git2::ErrorClass::Ssl => GitError::Network {
                    message: format!("{}: {}", context, err.message()),
                },
                git2::ErrorClass::Os => GitError::AccessError {
                    message: format!("{}: {}", context, err.message()),
                },
                _ => GitError::Internal {
                    message: format!("{}: {}", context, err.message()),
                },
            },
        }
    }
}

impl From<git2::Error> for GitError {
    fn from(err: git2::Error) -> Self {
        GitError::from_git2(err, "git")
    }
}

impl From<TypeError> for GitError {
    fn from(err: TypeError) -> Self {
        match err {
            TypeError::InvalidOid(msg) => GitError::InvalidOid { oid: msg },
            TypeError::InvalidBranchName(msg) | TypeError::InvalidRemoteName(msg) => {
                GitError::InvalidRefName { message: msg }
            }
            other => GitError::Internal {
                message: other.to_string(),
            },
        }
    }
}

/// Convert our validated Oid into a git2 Oid.
pub(super) fn to_git2(oid: &Oid) -> Result<git2::Oid, GitError> {
    git2::Oid::from_str(oid.as_str()).map_err(|e| GitError::from_git2(e, oid.as_str()))
}

/// Convert a git2 Oid into our validated Oid.
pub(super) fn from_git2_oid(oid: git2::Oid) -> Result<Oid, GitError> {
    Ok(Oid::new(oid.to_string())?)
}

/// Reject absolute paths and paths that climb out of the working tree.
pub(super) fn check_relative(path: &str) -> Result<&Path, GitError> {
    let rel = Path::new(path);
    let ok = !path.is_empty()
        && rel
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if ok {
        Ok(rel)
    } else {
        Err(GitError::InvalidPath {
            path: path.to_string(),
        })
    }
}

/// State of in-progress Git operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum GitState {
    /// No operation in progress.
    Clean,
    /// Merge in progress.
    Merge,
    /// Rebase in progress.
    Rebase,
    /// Cherry-pick in progress.
    CherryPick,
    /// Revert in progress.
    Revert,
    /// Bisect in progress.
    Bisect,
    /// Apply mailbox in progress.
    ApplyMailbox,
}

impl GitState {
    /// Check if any operation is in progress.
    ///
    /// # Example
    ///
    /// ```
    /// use gitdeck::git::GitState;
    ///
    /// assert!(!GitState::Clean.is_in_progress());
    /// assert!(GitState::Merge.is_in_progress());
    /// ```
    pub fn is_in_progress(&self) -> bool {
        !matches!(self, GitState::Clean)
    }

    /// Get a human-readable description of the state.
    pub fn description(&self) -> &'static str {
        match self {
            GitState::Clean => "clean",
            GitState::Merge => "merge",
            GitState::Rebase => "rebase",
            GitState::CherryPick => "cherry-pick",
            GitState::Revert => "revert",
            GitState::Bisect => "bisect",
            GitState::ApplyMailbox => "apply-mailbox",
        }
    }
}

impl std::fmt::Display for GitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

/// How a path differs in one area (index or working tree).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
    Renamed,
    TypeChanged,
    Untracked,
    Conflicted,
}

/// Status of one file relative to HEAD (index) and to the index (worktree).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    pub path: String,
    /// Staged change, if any
    pub index: Option<ChangeKind>,
    /// Unstaged change, if any
    pub worktree: Option<ChangeKind>,
}

/// Summary of working tree status.
///
/// Provides counts of different types of changes in the working tree,
/// useful for pre-command checks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorktreeStatus {
    /// Number of staged changes
    pub staged: usize,
    /// Number of unstaged changes to tracked files
    pub unstaged: usize,
    /// Number of untracked files (if requested)
    pub untracked: usize,
    /// Whether there are unresolved conflicts
    pub has_conflicts: bool,
}

impl WorktreeStatus {
    /// Check if tracked files are clean (untracked files do not count).
    pub fn is_clean(&self) -> bool {
        self.staged == 0 && self.unstaged == 0 && !self.has_conflicts
    }

    /// Check if there are any staged changes ready to commit.
    pub fn has_staged(&self) -> bool {
        self.staged > 0
    }
}

/// Snapshot of the repository's current state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    /// Current branch; present even before the first commit
    pub branch: Option<String>,
    /// HEAD commit, absent before the first commit
    pub head: Option<Oid>,
    pub staged: Vec<String>,
    pub unstaged: Vec<String>,
    pub untracked: Vec<String>,
    pub conflicted: Vec<String>,
    pub state: GitState,
}

/// Information about a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitInfo {
    /// The commit OID
    pub oid: Oid,
    /// First line of the commit message
    pub summary: String,
    /// Full commit message
    pub message: String,
    /// Author name
    pub author_name: String,
    /// Author email
    pub author_email: String,
    /// Author timestamp
    pub author_time: UtcTimestamp,
    /// Parent commits, first parent first
    pub parents: Vec<Oid>,
}

/// Which branches to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchKind {
    Local,
    Remote,
}

/// A local or remote-tracking branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchInfo {
    /// Short name (`main`, or `origin/main` for remote-tracking)
    pub name: String,
    pub remote: bool,
    /// Whether HEAD points at this branch
    pub current: bool,
    pub commit: Oid,
    /// Upstream short name, for local branches that track one
    pub upstream: Option<String>,
}

/// Where to read a file from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSource {
    Worktree,
    Index,
    Head,
    Commit(Oid),
}

/// One side of a conflicted path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictSide {
    Ours,
    Theirs,
}

/// The Git interface.
///
/// This is the **single point of interaction** with Git. All repository
/// reads and writes flow through this interface. No other module should
/// import `git2` directly.
pub struct Git {
    /// The underlying git2 repository
    pub(super) repo: git2::Repository,
    /// Identity used when the repository has none configured
    identity: Option<(String, String)>,
}

impl std::fmt::Debug for Git {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Git")
            .field("path", &self.repo.path())
            .finish()
    }
}

impl Git {
    // =========================================================================
    // Repository Opening
    // =========================================================================

    /// Open the repository whose working tree is exactly `path`.
    ///
    /// # Errors
    ///
    /// - [`GitError::NotARepo`] if `path` is not a repository root
    /// - [`GitError::BareRepo`] if the repository has no working directory
    pub fn open(path: &Path) -> Result<Self, GitError> {
        let repo = git2::Repository::open(path).map_err(|_| GitError::NotARepo {
            path: path.to_path_buf(),
        })?;

        if repo.is_bare() {
            return Err(GitError::BareRepo);
        }

        Ok(Self {
            repo,
            identity: None,
        })
    }

    /// Create a new repository at `path` with `initial_branch` as its
    /// unborn HEAD.
    pub fn init(path: &Path, initial_branch: &BranchName) -> Result<Self, GitError> {
        let mut opts = git2::RepositoryInitOptions::new();
        opts.initial_head(initial_branch.as_str()).mkpath(true);
        let repo = git2::Repository::init_opts(path, &opts)
            .map_err(|e| GitError::from_git2(e, &path.display().to_string()))?;
        Ok(Self {
            repo,
            identity: None,
        })
    }

    /// Use `name <email>` for commits when the repository config has no
    /// identity.
    pub fn with_identity(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.identity = Some((name.into(), email.into()));
        self
    }

    /// The working directory.
    pub fn workdir(&self) -> Result<&Path, GitError> {
        self.repo.workdir().ok_or(GitError::BareRepo)
    }

    /// Whether HEAD is unborn, whatever branch it names.
    pub fn is_empty(&self) -> Result<bool, GitError> {
        Ok(self.head_commit()?.is_none())
    }

    /// Bring the working tree in line with HEAD without touching local
    /// modifications. Does nothing before the first commit.
    pub fn refresh_worktree(&self) -> Result<(), GitError> {
        if self.head_commit()?.is_none() {
            return Ok(());
        }
        let mut checkout = CheckoutBuilder::new();
        checkout.safe();
        self.repo
            .checkout_head(Some(&mut checkout))
            .map_err(|e| GitError::from_git2(e, "HEAD"))
    }

    // =========================================================================
    // State Detection
    // =========================================================================

    /// Get the current Git state (merge, rebase, etc.).
    pub fn state(&self) -> GitState {
        match self.repo.state() {
            git2::RepositoryState::Clean => GitState::Clean,
            git2::RepositoryState::Merge => GitState::Merge,
            git2::RepositoryState::Rebase
            | git2::RepositoryState::RebaseInteractive
            | git2::RepositoryState::RebaseMerge => GitState::Rebase,
            git2::RepositoryState::CherryPick | git2::RepositoryState::CherryPickSequence => {
                GitState::CherryPick
            }
            git2::RepositoryState::Revert | git2::RepositoryState::RevertSequence => {
                GitState::Revert
            }
            git2::RepositoryState::Bisect => GitState::Bisect,
            git2::RepositoryState::ApplyMailbox | git2::RepositoryState::ApplyMailboxOrRebase => {
                GitState::ApplyMailbox
            }
        }
    }

    /// Check if there are unresolved conflicts in the index.
    pub fn has_conflicts(&self) -> Result<bool, GitError> {
        Ok(self.repo.index()?.has_conflicts())
    }

    // =========================================================================
    // Working Tree Status
    // =========================================================================

    /// Get working tree status summary.
    ///
    /// If `include_untracked` is false, untracked files are not counted.
    pub fn worktree_status(&self, include_untracked: bool) -> Result<WorktreeStatus, GitError> {
        let mut result = WorktreeStatus::default();

        for entry in self.files_with_changes(include_untracked)? {
            if entry.index == Some(ChangeKind::Conflicted) {
                result.has_conflicts = true;
                continue;
            }
            if entry.index.is_some() {
                result.staged += 1;
            }
            match entry.worktree {
                Some(ChangeKind::Untracked) => result.untracked += 1,
                Some(_) => result.unstaged += 1,
                None => {}
            }
        }

        Ok(result)
    }

    /// Files that differ from HEAD in the index or working tree.
    fn files_with_changes(&self, include_untracked: bool) -> Result<Vec<FileEntry>, GitError> {
        let mut opts = git2::StatusOptions::new();
        opts.include_untracked(include_untracked)
            .recurse_untracked_dirs(include_untracked)
            .include_ignored(false);

        let statuses = self.repo.statuses(Some(&mut opts))?;
        let mut entries = Vec::new();
        for entry in statuses.iter() {
            let Some(path) = entry.path() else { continue };
            let (index, worktree) = classify(entry.status());
            if index.is_none() && worktree.is_none() {
                continue;
            }
            entries.push(FileEntry {
                path: path.to_string(),
                index,
                worktree,
            });
        }
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    /// Every tracked, changed, or untracked file, ordered by path.
    ///
    /// Unchanged tracked files are listed with no index or worktree status.
    pub fn files(&self) -> Result<Vec<FileEntry>, GitError> {
        let mut all: BTreeMap<String, FileEntry> = BTreeMap::new();
        let index = self.repo.index()?;
        for entry in index.iter() {
            let path = String::from_utf8_lossy(&entry.path).into_owned();
            all.entry(path.clone()).or_insert(FileEntry {
                path,
                index: None,
                worktree: None,
            });
        }
        for entry in self.files_with_changes(true)? {
            all.insert(entry.path.clone(), entry);
        }
        Ok(all.into_values().collect())
    }

    /// Branch, HEAD and the staged/unstaged/untracked/conflicted path sets.
    pub fn status(&self) -> Result<StatusSnapshot, GitError> {
        let mut snapshot = StatusSnapshot {
            branch: self.current_branch()?.map(String::from),
            head: self.try_head_oid()?,
            staged: Vec::new(),
            unstaged: Vec::new(),
            untracked: Vec::new(),
            conflicted: Vec::new(),
            state: self.state(),
        };

        for entry in self.files_with_changes(true)? {
            if entry.index == Some(ChangeKind::Conflicted) {
                snapshot.conflicted.push(entry.path);
                continue;
            }
            if entry.index.is_some() {
                snapshot.staged.push(entry.path.clone());
            }
            match entry.worktree {
                Some(ChangeKind::Untracked) => snapshot.untracked.push(entry.path),
                Some(_) => snapshot.unstaged.push(entry.path),
                None => {}
            }
        }

        Ok(snapshot)
    }

    // =========================================================================
    // Ref Resolution
    // =========================================================================

    /// The HEAD commit, or `None` before the first commit.
    pub(super) fn head_commit(&self) -> Result<Option<git2::Commit<'_>>, GitError> {
        match self.repo.head() {
            Ok(head) => Ok(Some(
                head.peel_to_commit()
                    .map_err(|e| GitError::from_git2(e, "HEAD"))?,
            )),
            Err(e)
                if e.code() == git2::ErrorCode::UnbornBranch
                    || e.code() == git2::ErrorCode::NotFound =>
            {
                Ok(None)
            }
            Err(e) => Err(GitError::from_git2(e, "HEAD")),
        }
    }

    /// Get HEAD commit OID, or `None` before the first commit.
    pub fn try_head_oid(&self) -> Result<Option<Oid>, GitError> {
        self.head_commit()?
            .map(|commit| from_git2_oid(commit.id()))
            .transpose()
    }

    /// Resolve any revision expression (`main`, `HEAD~2`, a hash) to a
    /// commit.
    pub fn resolve_commit(&self, spec: &str) -> Result<Oid, GitError> {
        let object = self.repo.revparse_single(spec).map_err(|e| {
            if e.code() == git2::ErrorCode::NotFound || e.code() == git2::ErrorCode::InvalidSpec {
                GitError::RefNotFound {
                    refname: spec.to_string(),
                }
            } else {
                GitError::from_git2(e, spec)
            }
        })?;
        let commit = object
            .peel_to_commit()
            .map_err(|e| GitError::from_git2(e, spec))?;
        from_git2_oid(commit.id())
    }

    /// Get the current branch name, if on a branch.
    ///
    /// Before the first commit this is the unborn branch HEAD points at.
    /// Returns `None` if HEAD is detached.
    pub fn current_branch(&self) -> Result<Option<BranchName>, GitError> {
        let head = self
            .repo
            .find_reference("HEAD")
            .map_err(|e| GitError::from_git2(e, "HEAD"))?;

        match head.symbolic_target() {
            Some(target) => match target.strip_prefix("refs/heads/") {
                Some(name) => Ok(Some(BranchName::new(name)?)),
                None => Ok(None),
            },
            None => Ok(None),
        }
    }

    // =========================================================================
    // Branches
    // =========================================================================

    /// List local or remote-tracking branches, ordered by name.
    pub fn branches(&self, kind: BranchKind) -> Result<Vec<BranchInfo>, GitError> {
        let filter = match kind {
            BranchKind::Local => git2::BranchType::Local,
            BranchKind::Remote => git2::BranchType::Remote,
        };

        let mut result = Vec::new();
        for item in self.repo.branches(Some(filter))? {
            let (branch, _) = item?;
            let Some(name) = branch.name().ok().flatten().map(String::from) else {
                continue; // non-UTF-8 name
            };
            // Symbolic refs such as origin/HEAD have no direct target
            let Some(target) = branch.get().target() else {
                continue;
            };
            let upstream = match kind {
                BranchKind::Local => branch
                    .upstream()
                    .ok()
                    .and_then(|u| u.name().ok().flatten().map(String::from)),
                BranchKind::Remote => None,
            };
            result.push(BranchInfo {
                name,
                remote: kind == BranchKind::Remote,
                current: branch.is_head(),
                commit: from_git2_oid(target)?,
                upstream,
            });
        }

        result.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(result)
    }

    /// Tip of a local branch, if it exists.
    pub fn branch_tip(&self, name: &BranchName) -> Result<Option<Oid>, GitError> {
        match self.repo.find_branch(name.as_str(), git2::BranchType::Local) {
            Ok(branch) => branch.get().target().map(from_git2_oid).transpose(),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(GitError::from_git2(e, &format!("refs/heads/{name}"))),
        }
    }

    /// Switch HEAD to `name`, creating it from HEAD first when `create` is
    /// set and it does not exist.
    ///
    /// Uses a safe checkout: files with local modifications are never
    /// overwritten. Callers check cleanliness first.
    pub fn switch_branch(&self, name: &BranchName, create: bool) -> Result<(), GitError> {
        let refname = format!("refs/heads/{name}");
        let exists = self.branch_tip(name)?.is_some();

        if !exists {
            if !create {
                return Err(GitError::RefNotFound { refname });
            }
            match self.head_commit()? {
                Some(head) => {
                    self.repo
                        .branch(name.as_str(), &head, false)
                        .map_err(|e| GitError::from_git2(e, &refname))?;
                }
                None => {
                    // Nothing to check out yet; repoint the unborn HEAD
                    self.repo
                        .set_head(&refname)
                        .map_err(|e| GitError::from_git2(e, &refname))?;
                    return Ok(());
                }
            }
        }

        let target = self
            .repo
            .revparse_single(&refname)
            .map_err(|e| GitError::from_git2(e, &refname))?;
        let mut checkout = CheckoutBuilder::new();
        checkout.safe();
        self.repo
            .checkout_tree(&target, Some(&mut checkout))
            .map_err(|e| GitError::from_git2(e, &refname))?;
        self.repo
            .set_head(&refname)
            .map_err(|e| GitError::from_git2(e, &refname))?;
        Ok(())
    }

    /// Delete a local branch.
    pub fn delete_branch(&self, name: &BranchName) -> Result<(), GitError> {
        let refname = format!("refs/heads/{name}");
        let mut branch = self
            .repo
            .find_branch(name.as_str(), git2::BranchType::Local)
            .map_err(|e| GitError::from_git2(e, &refname))?;
        branch
            .delete()
            .map_err(|e| GitError::from_git2(e, &refname))
    }

    /// Whether every commit on `name` is reachable from some other local or
    /// remote-tracking branch.
    pub fn is_merged_elsewhere(&self, name: &BranchName) -> Result<bool, GitError> {
        let Some(tip) = self.branch_tip(name)? else {
            return Err(GitError::RefNotFound {
                refname: format!("refs/heads/{name}"),
            });
        };

        for kind in [BranchKind::Local, BranchKind::Remote] {
            for other in self.branches(kind)? {
                if kind == BranchKind::Local && other.name == name.as_str() {
                    continue;
                }
                if self.is_ancestor(&tip, &other.commit)? {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Upstream of a local branch as (short name, tip).
    pub fn upstream_of(&self, name: &BranchName) -> Result<Option<(String, Oid)>, GitError> {
        let branch = match self.repo.find_branch(name.as_str(), git2::BranchType::Local) {
            Ok(branch) => branch,
            Err(e) if e.code() == git2::ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(GitError::from_git2(e, &format!("refs/heads/{name}"))),
        };
        let upstream = match branch.upstream() {
            Ok(upstream) => upstream,
            Err(e) if e.code() == git2::ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let Some(short) = upstream.name().ok().flatten().map(String::from) else {
            return Ok(None);
        };
        match upstream.get().target() {
            Some(target) => Ok(Some((short, from_git2_oid(target)?))),
            None => Ok(None),
        }
    }

    /// Remote configured as the upstream of local branch `name`, whether or
    /// not its remote-tracking ref has been fetched yet.
    pub fn upstream_remote(&self, name: &BranchName) -> Result<Option<RemoteName>, GitError> {
        let config = self.repo.config()?;
        match config.get_string(&format!("branch.{name}.remote")) {
            Ok(remote) if remote != "." => Ok(Some(RemoteName::new(remote)?)),
            Ok(_) => Ok(None),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Record `remote/name` as the upstream of local branch `name`.
    ///
    /// Written straight to config so it works before the remote-tracking
    /// ref exists.
    pub fn set_upstream(&self, name: &BranchName, remote: &str) -> Result<(), GitError> {
        let mut config = self.repo.config()?;
        config.set_str(&format!("branch.{name}.remote"), remote)?;
        config.set_str(&format!("branch.{name}.merge"), &format!("refs/heads/{name}"))?;
        Ok(())
    }

    // =========================================================================
    // Ancestry Queries
    // =========================================================================

    /// Find the merge base (common ancestor) of two commits.
    ///
    /// Returns `None` if there is no common ancestor.
    pub fn merge_base(&self, oid1: &Oid, oid2: &Oid) -> Result<Option<Oid>, GitError> {
        match self.repo.merge_base(to_git2(oid1)?, to_git2(oid2)?) {
            Ok(oid) => Ok(Some(from_git2_oid(oid)?)),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Check if `ancestor` is an ancestor of `descendant`.
    ///
    /// Returns true if ancestor == descendant (a commit is its own ancestor).
    pub fn is_ancestor(&self, ancestor: &Oid, descendant: &Oid) -> Result<bool, GitError> {
        if ancestor == descendant {
            return Ok(true);
        }
        Ok(self
            .repo
            .graph_descendant_of(to_git2(descendant)?, to_git2(ancestor)?)?)
    }

    /// Commits on `local` not on `upstream`, and the reverse.
    pub fn ahead_behind(&self, local: &Oid, upstream: &Oid) -> Result<(usize, usize), GitError> {
        Ok(self
            .repo
            .graph_ahead_behind(to_git2(local)?, to_git2(upstream)?)?)
    }

    // =========================================================================
    // Staging
    // =========================================================================

    /// Stage paths. A path missing from the working tree stages its
    /// deletion. Staging a conflicted path marks it resolved.
    pub fn stage(&self, paths: &[String]) -> Result<(), GitError> {
        let workdir = self.workdir()?.to_path_buf();
        let mut index = self.repo.index()?;

        for path in paths {
            let rel = check_relative(path)?;
            let full = workdir.join(rel);
            if full.is_file() {
                index
                    .add_path(rel)
                    .map_err(|e| GitError::from_git2(e, path))?;
            } else if full.is_dir() {
                index
                    .add_all([path.as_str()], git2::IndexAddOption::DEFAULT, None)
                    .map_err(|e| GitError::from_git2(e, path))?;
            } else if index.get_path(rel, 0).is_some() || self.is_conflicted(&index, rel)? {
                index
                    .remove_path(rel)
                    .map_err(|e| GitError::from_git2(e, path))?;
            } else {
                return Err(GitError::PathNotFound { path: path.clone() });
            }
        }

        index.write()?;
        Ok(())
    }

    fn is_conflicted(&self, index: &git2::Index, rel: &Path) -> Result<bool, GitError> {
        if !index.has_conflicts() {
            return Ok(false);
        }
        let wanted = rel.to_string_lossy();
        for conflict in index.conflicts()? {
            if conflict_path(&conflict?).as_deref() == Some(wanted.as_ref()) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Paths with staged changes.
    pub fn staged_paths(&self) -> Result<Vec<String>, GitError> {
        Ok(self
            .files_with_changes(false)?
            .into_iter()
            .filter(|e| e.index.is_some() && e.index != Some(ChangeKind::Conflicted))
            .map(|e| e.path)
            .collect())
    }

    /// Unstage `paths`, or everything when `None`. Working files are left
    /// alone.
    pub fn unstage(&self, paths: Option<&[String]>) -> Result<(), GitError> {
        let targets = match paths {
            Some(paths) => {
                for path in paths {
                    check_relative(path)?;
                }
                paths.to_vec()
            }
            None => self.staged_paths()?,
        };
        if targets.is_empty() {
            return Ok(());
        }

        match self.head_commit()? {
            Some(head) => self
                .repo
                .reset_default(Some(head.as_object()), targets.iter().map(String::as_str))?,
            None => {
                let mut index = self.repo.index()?;
                for path in &targets {
                    index.remove_path(Path::new(path))?;
                }
                index.write()?;
            }
        }
        Ok(())
    }

    /// Discard staged and unstaged edits to `path`, restoring it from HEAD.
    ///
    /// A path that is new since HEAD is dropped from the index and left on
    /// disk as an untracked file.
    pub fn revert_path(&self, path: &str) -> Result<(), GitError> {
        let rel = check_relative(path)?;
        let head = self.head_commit()?;
        let in_head = match &head {
            Some(commit) => commit.tree()?.get_path(rel).is_ok(),
            None => false,
        };

        if let (true, Some(commit)) = (in_head, &head) {
            self.repo.reset_default(Some(commit.as_object()), [path])?;
            let mut checkout = CheckoutBuilder::new();
            checkout.force().path(path);
            self.repo
                .checkout_head(Some(&mut checkout))
                .map_err(|e| GitError::from_git2(e, path))?;
            return Ok(());
        }

        let mut index = self.repo.index()?;
        if index.get_path(rel, 0).is_none() {
            return Err(GitError::PathNotFound {
                path: path.to_string(),
            });
        }
        index.remove_path(rel)?;
        index.write()?;
        Ok(())
    }

    // =========================================================================
    // Commits
    // =========================================================================

    fn signature(&self) -> Result<git2::Signature<'static>, GitError> {
        match self.repo.signature() {
            Ok(sig) => Ok(sig.to_owned()),
            Err(e) if e.code() == git2::ErrorCode::NotFound => match &self.identity {
                Some((name, email)) => Ok(git2::Signature::now(name, email)?),
                None => Err(GitError::NoIdentity),
            },
            Err(e) => Err(e.into()),
        }
    }

    /// Merge heads recorded for an in-progress merge.
    pub fn merge_heads(&self) -> Result<Vec<Oid>, GitError> {
        if self.repo.state() != git2::RepositoryState::Merge {
            return Ok(Vec::new());
        }
        // integrate records a single merge head
        match self.repo.revparse_single("MERGE_HEAD") {
            Ok(object) => Ok(vec![from_git2_oid(object.id())?]),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(Vec::new()),
            Err(e) => Err(GitError::from_git2(e, "MERGE_HEAD")),
        }
    }

    /// Commit the index on HEAD.
    ///
    /// During a merge the merge heads become extra parents and the merge
    /// state is cleared afterwards.
    pub fn commit(&self, message: &str) -> Result<Oid, GitError> {
        let sig = self.signature()?;
        let mut index = self.repo.index()?;
        let tree_id = index.write_tree()?;
        let tree = self.repo.find_tree(tree_id)?;

        let mut parents = Vec::new();
        if let Some(head) = self.head_commit()? {
            parents.push(head);
        }
        let merge_heads = self.merge_heads()?;
        for id in &merge_heads {
            let commit = self
                .repo
                .find_commit(to_git2(id)?)
                .map_err(|e| GitError::from_git2(e, id.as_str()))?;
            parents.push(commit);
        }
        let parent_refs: Vec<&git2::Commit<'_>> = parents.iter().collect();

        let oid = self
            .repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parent_refs)?;
        if !merge_heads.is_empty() {
            self.repo.cleanup_state()?;
        }
        from_git2_oid(oid)
    }

    /// Get information about a commit.
    ///
    /// # Errors
    ///
    /// - [`GitError::ObjectNotFound`] if the commit doesn't exist
    pub fn commit_info(&self, oid: &Oid) -> Result<CommitInfo, GitError> {
        let commit = self
            .repo
            .find_commit(to_git2(oid)?)
            .map_err(|e| GitError::from_git2(e, oid.as_str()))?;
        commit_to_info(&commit)
    }

    /// First-parent history, most recent first.
    ///
    /// Starts at HEAD, or just below `before` when given (`before` itself is
    /// excluded).
    pub fn log(&self, before: Option<&Oid>, limit: usize) -> Result<Vec<CommitInfo>, GitError> {
        let start = match before {
            Some(oid) => {
                let id = to_git2(oid)?;
                self.repo
                    .find_commit(id)
                    .map_err(|e| GitError::from_git2(e, oid.as_str()))?;
                id
            }
            None => match self.head_commit()? {
                Some(head) => head.id(),
                None => return Ok(Vec::new()),
            },
        };

        let mut walk = self.repo.revwalk()?;
        walk.push(start)?;
        walk.simplify_first_parent()?;

        let mut commits = Vec::new();
        for id in walk {
            let id = id?;
            if before.is_some() && id == start {
                continue;
            }
            if commits.len() >= limit {
                break;
            }
            commits.push(commit_to_info(&self.repo.find_commit(id)?)?);
        }
        Ok(commits)
    }

    // =========================================================================
    // File Content
    // =========================================================================

    /// Raw bytes of `path` from the chosen source.
    pub fn read_file_bytes(&self, path: &str, source: &FileSource) -> Result<Vec<u8>, GitError> {
        let rel = check_relative(path)?;
        let not_found = || GitError::PathNotFound {
            path: path.to_string(),
        };

        match source {
            FileSource::Worktree => fs::read(self.workdir()?.join(rel)).map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    not_found()
                } else {
                    GitError::AccessError {
                        message: format!("{path}: {e}"),
                    }
                }
            }),
            FileSource::Index => {
                let index = self.repo.index()?;
                let entry = index.get_path(rel, 0).ok_or_else(not_found)?;
                Ok(self.repo.find_blob(entry.id)?.content().to_vec())
            }
            FileSource::Head => {
                let head = self.head_commit()?.ok_or_else(not_found)?;
                self.blob_at(&head, rel).ok_or_else(not_found)
            }
            FileSource::Commit(oid) => {
                let commit = self
                    .repo
                    .find_commit(to_git2(oid)?)
                    .map_err(|e| GitError::from_git2(e, oid.as_str()))?;
                self.blob_at(&commit, rel).ok_or_else(not_found)
            }
        }
    }

    /// UTF-8 content of `path` from the chosen source.
    pub fn read_file(&self, path: &str, source: &FileSource) -> Result<String, GitError> {
        String::from_utf8(self.read_file_bytes(path, source)?).map_err(|_| {
            GitError::InvalidUtf8 {
                path: path.to_string(),
            }
        })
    }

    fn blob_at(&self, commit: &git2::Commit<'_>, rel: &Path) -> Option<Vec<u8>> {
        let entry = commit.tree().ok()?.get_path(rel).ok()?;
        let blob = self.repo.find_blob(entry.id()).ok()?;
        Some(blob.content().to_vec())
    }

    /// Write `content` to `path` in the working tree, creating parents.
    pub fn write_worktree_file(&self, path: &str, content: &[u8]) -> Result<(), GitError> {
        let full = self.workdir()?.join(check_relative(path)?);
        let io_err = |e: std::io::Error| GitError::AccessError {
            message: format!("{path}: {e}"),
        };
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(&full, content).map_err(io_err)
    }

    /// Remove `path` from the working tree if present.
    pub fn remove_worktree_file(&self, path: &str) -> Result<(), GitError> {
        let full = self.workdir()?.join(check_relative(path)?);
        match fs::remove_file(&full) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(GitError::AccessError {
                message: format!("{path}: {e}"),
            }),
        }
    }

    /// Whether the working tree holds anything besides `.git`.
    pub fn worktree_has_files(&self) -> Result<bool, GitError> {
        let entries = fs::read_dir(self.workdir()?).map_err(|e| GitError::AccessError {
            message: e.to_string(),
        })?;
        for entry in entries {
            let entry = entry.map_err(|e| GitError::AccessError {
                message: e.to_string(),
            })?;
            if entry.file_name() != ".git" {
                return Ok(true);
            }
        }
        Ok(false)
    }

    // =========================================================================
    // Conflicts
    // =========================================================================

    /// Conflicted paths in the index, sorted.
    pub fn conflicted_paths(&self) -> Result<Vec<String>, GitError> {
        let index = self.repo.index()?;
        if !index.has_conflicts() {
            return Ok(Vec::new());
        }
        let mut paths = Vec::new();
        for conflict in index.conflicts()? {
            if let Some(path) = conflict_path(&conflict?) {
                paths.push(path);
            }
        }
        paths.sort();
        paths.dedup();
        Ok(paths)
    }

    /// Content of one side of a conflicted path; `None` when that side
    /// deleted it.
    pub fn conflict_side(&self, path: &str, side: ConflictSide) -> Result<Option<Vec<u8>>, GitError> {
        let index = self.repo.index()?;
        for conflict in index.conflicts()? {
            let conflict = conflict?;
            if conflict_path(&conflict).as_deref() != Some(path) {
                continue;
            }
            let entry = match side {
                ConflictSide::Ours => conflict.our,
                ConflictSide::Theirs => conflict.their,
            };
            return match entry {
                Some(entry) => Ok(Some(self.repo.find_blob(entry.id)?.content().to_vec())),
                None => Ok(None),
            };
        }
        Err(GitError::PathNotFound {
            path: path.to_string(),
        })
    }

    /// Reset index and tracked files to HEAD and drop merge state.
    pub fn abort_merge(&self) -> Result<(), GitError> {
        let head = self.head_commit()?.ok_or_else(|| GitError::RefNotFound {
            refname: "HEAD".to_string(),
        })?;
        self.repo
            .reset(head.as_object(), git2::ResetType::Hard, None)
            .map_err(|e| GitError::from_git2(e, "HEAD"))?;
        self.repo.cleanup_state()?;
        Ok(())
    }
}

fn conflict_path(conflict: &git2::IndexConflict) -> Option<String> {
    conflict
        .our
        .as_ref()
        .or(conflict.their.as_ref())
        .or(conflict.ancestor.as_ref())
        .map(|entry| String::from_utf8_lossy(&entry.path).into_owned())
}

fn commit_to_info(commit: &git2::Commit<'_>) -> Result<CommitInfo, GitError> {
    let author = commit.author();
    let parents = commit
        .parent_ids()
        .map(from_git2_oid)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(CommitInfo {
        oid: from_git2_oid(commit.id())?,
        summary: commit.summary().unwrap_or("").to_string(),
        message: commit.message().unwrap_or("").to_string(),
        author_name: author.name().unwrap_or("").to_string(),
        author_email: author.email().unwrap_or("").to_string(),
        author_time: UtcTimestamp::from_unix(author.when().seconds()),
        parents,
    })
}

/// Split a git2 status into (index change, worktree change).
fn classify(status: git2::Status) -> (Option<ChangeKind>, Option<ChangeKind>) {
    if status.is_conflicted() {
        return (Some(ChangeKind::Conflicted), Some(ChangeKind::Conflicted));
    }

    let index = if status.is_index_new() {
        Some(ChangeKind::Added)
    } else if status.is_index_modified() {
        Some(ChangeKind::Modified)
    } else if status.is_index_deleted() {
        Some(ChangeKind::Deleted)
    } else if status.is_index_renamed() {
        Some(ChangeKind::Renamed)
    } else if status.is_index_typechange() {
        Some(ChangeKind::TypeChanged)
    } else {
        None
    };

    let worktree = if status.is_wt_new() {
        Some(ChangeKind::Untracked)
    } else if status.is_wt_modified() {
        Some(ChangeKind::Modified)
    } else if status.is_wt_deleted() {
        Some(ChangeKind::Deleted)
    } else if status.is_wt_renamed() {
        Some(ChangeKind::Renamed)
    } else if status.is_wt_typechange() {
        Some(ChangeKind::TypeChanged)
    } else {
        None
    };

    (index, worktree)
}

//! engine::model
//!
//! Request and response types of engine operations.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;

use super::merge::MergeState;
use crate::core::registry::{Project, ProjectSummary};
use crate::core::types::{BranchName, Oid, ProjectName, RemoteName};
use crate::git::{CommitInfo, Credentials, DiffStat, Integration, StatusSnapshot};

/// How a new project's repository comes into being.
#[derive(Debug, Clone)]
pub enum ProjectSource {
    /// Empty repository, no commits
    Empty,
    /// Repository with an initial commit of the default files plus `files`
    Template { files: BTreeMap<String, String> },
    /// Clone of an existing remote, recorded as `origin`
    Clone {
        url: String,
        credentials: Option<Credentials>,
        branch: Option<BranchName>,
    },
}

/// Request to create a project.
#[derive(Debug, Clone)]
pub struct ProjectSpec {
    pub name: ProjectName,
    pub description: String,
    pub source: ProjectSource,
}

impl ProjectSpec {
    /// An empty project.
    pub fn empty(name: ProjectName) -> Self {
        Self {
            name,
            description: String::new(),
            source: ProjectSource::Empty,
        }
    }
}

/// Changes to a project's metadata. `None` leaves a field as is.
#[derive(Debug, Clone, Default)]
pub struct ProjectUpdate {
    pub description: Option<String>,
}

/// All projects plus the caller's active one.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectList {
    pub projects: Vec<ProjectSummary>,
    pub active: Option<ProjectName>,
}

/// Options for [`get_status`](super::Engine::get_status).
#[derive(Debug, Clone, Default)]
pub struct StatusOptions {
    /// Fetch the upstream and report ahead/behind counts
    pub include_remote: bool,
    /// Overrides the configured network timeout
    pub timeout: Option<Duration>,
}

/// Position of the current branch relative to its upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteStatus {
    /// Upstream short name (`origin/main`)
    pub upstream: Option<String>,
    pub ahead: usize,
    pub behind: usize,
    /// Why the remote could not be consulted; counts are then from the last
    /// successful fetch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unreachable: Option<String>,
}

/// Project status.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectStatus {
    #[serde(flatten)]
    pub snapshot: StatusSnapshot,
    pub merge: MergeState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote: Option<RemoteStatus>,
}

/// A branch relative to the current branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchStatus {
    pub branch: BranchName,
    pub commit: Oid,
    /// Commits on `branch` missing from the current branch
    pub ahead: usize,
    /// Commits on the current branch missing from `branch`
    pub behind: usize,
}

/// A commit with its change summary.
#[derive(Debug, Clone, Serialize)]
pub struct CommitDetail {
    #[serde(flatten)]
    pub info: CommitInfo,
    pub stats: DiffStat,
    pub files: Vec<String>,
}

/// A page of history.
#[derive(Debug, Clone, Default)]
pub struct CommitQuery {
    /// Defaults to the configured page size
    pub limit: Option<usize>,
    /// Start below this commit (exclusive)
    pub before: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommitPage {
    pub commits: Vec<CommitInfo>,
    /// Pass as `before` to get the next page; absent on the last page
    pub next: Option<Oid>,
}

/// Which version of a file to read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeRef {
    Worktree,
    Index,
    Head,
    /// Any revision expression
    Commit(String),
}

/// Which diff to compute for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffType {
    Unstaged,
    Staged,
    /// Between two revisions; `from` defaults to the first parent of `to`
    Commit { from: Option<String>, to: String },
}

/// A remote as reported to callers. Never carries the secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteView {
    pub name: RemoteName,
    pub url: String,
    /// Whether credentials are stored for this remote
    pub has_auth: bool,
}

/// Request to add a remote.
#[derive(Debug, Clone)]
pub struct RemoteSpec {
    pub name: RemoteName,
    pub url: String,
    pub credentials: Option<Credentials>,
}

/// Change to a remote's stored credentials.
#[derive(Debug, Clone)]
pub enum AuthUpdate {
    Set(Credentials),
    Clear,
}

/// Changes to a remote. `None` leaves a field as is.
#[derive(Debug, Clone, Default)]
pub struct RemoteUpdate {
    pub url: Option<String>,
    pub auth: Option<AuthUpdate>,
}

#[derive(Debug, Clone, Default)]
pub struct PullOptions {
    /// Defaults to the branch's upstream remote, then `origin`
    pub remote: Option<RemoteName>,
    /// Record the remote as the branch's upstream afterwards
    pub track: bool,
    pub allow_unrelated_histories: bool,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PullOutcome {
    pub remote: RemoteName,
    pub branch: BranchName,
    #[serde(flatten)]
    pub integration: Integration,
    pub merge: MergeState,
}

#[derive(Debug, Clone, Default)]
pub struct PushOptions {
    pub remote: Option<RemoteName>,
    pub track: bool,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PushOutcome {
    pub remote: RemoteName,
    pub branch: BranchName,
    pub head: Oid,
}

/// Project metadata plus its current branch, for `get_project`.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectDetails {
    #[serde(flatten)]
    pub project: Project,
    pub branch: Option<String>,
    pub head: Option<Oid>,
    pub active: bool,
}

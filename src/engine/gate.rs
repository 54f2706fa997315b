//! engine::gate
//!
//! Preconditions checked before an operation touches a repository.
//!
//! Each operation declares a [`RequirementSet`]. [`gate`] reads the
//! repository once, checks every requirement in order and either returns
//! the facts it read ([`Gated`]) or the error for the first unmet one.
//! Operations never re-derive merge state or the current branch on their
//! own.

use tracing::debug;

use super::error::EngineError;
use super::merge::MergeState;
use crate::core::types::{BranchName, Oid};
use crate::git::Git;

/// A single precondition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// No merge is in progress
    NoMergeInProgress,
    /// A merge is in progress
    MergeInProgress,
    /// No staged or unstaged changes to tracked files
    CleanTrackedTree,
    /// HEAD points at a branch
    OnBranch,
    /// HEAD has at least one commit
    HasCommits,
}

/// Named list of requirements.
#[derive(Debug, Clone, Copy)]
pub struct RequirementSet {
    pub name: &'static str,
    pub requirements: &'static [Requirement],
}

impl RequirementSet {
    pub const fn new(name: &'static str, requirements: &'static [Requirement]) -> Self {
        Self { name, requirements }
    }
}

/// Requirement sets shared by engine operations.
pub mod requirements {
    use super::*;

    /// Staging, unstaging, reverting, deleting branches.
    pub const WORKTREE_EDIT: RequirementSet =
        RequirementSet::new("worktree-edit", &[Requirement::NoMergeInProgress]);

    /// Adding, changing or removing remotes.
    pub const REMOTE_EDIT: RequirementSet =
        RequirementSet::new("remote-edit", &[Requirement::NoMergeInProgress]);

    /// Checking out another branch.
    pub const BRANCH_SWITCH: RequirementSet = RequirementSet::new(
        "branch-switch",
        &[Requirement::NoMergeInProgress, Requirement::CleanTrackedTree],
    );

    /// Resolving or aborting a merge.
    pub const MERGE_RESOLUTION: RequirementSet =
        RequirementSet::new("merge-resolution", &[Requirement::MergeInProgress]);

    /// Bringing remote commits into the current branch.
    pub const INTEGRATE: RequirementSet = RequirementSet::new(
        "integrate",
        &[
            Requirement::NoMergeInProgress,
            Requirement::OnBranch,
            Requirement::CleanTrackedTree,
        ],
    );

    /// Sending the current branch to a remote.
    pub const PUBLISH: RequirementSet = RequirementSet::new(
        "publish",
        &[
            Requirement::NoMergeInProgress,
            Requirement::OnBranch,
            Requirement::HasCommits,
        ],
    );

    /// Comparing branches.
    pub const HISTORY: RequirementSet =
        RequirementSet::new("history", &[Requirement::HasCommits]);
}

/// Repository facts read while gating.
#[derive(Debug, Clone)]
pub struct Gated {
    pub merge: MergeState,
    pub branch: Option<BranchName>,
    pub head: Option<Oid>,
}

impl Gated {
    /// The current branch. Guaranteed present when the set required
    /// [`Requirement::OnBranch`].
    pub fn branch(&self) -> Result<&BranchName, EngineError> {
        self.branch
            .as_ref()
            .ok_or_else(|| EngineError::InvalidArgument("HEAD is detached".to_string()))
    }

    /// The HEAD commit. Guaranteed present when the set required
    /// [`Requirement::HasCommits`].
    pub fn head(&self) -> Result<&Oid, EngineError> {
        self.head
            .as_ref()
            .ok_or_else(|| EngineError::InvalidArgument("project has no commits yet".to_string()))
    }
}

/// Check `set` against `git`.
pub fn gate(git: &Git, set: &RequirementSet) -> Result<Gated, EngineError> {
    let gated = Gated {
        merge: MergeState::load(git)?,
        branch: git.current_branch()?,
        head: git.try_head_oid()?,
    };

    for requirement in set.requirements {
        match requirement {
            Requirement::NoMergeInProgress => gated.merge.require_clean()?,
            Requirement::MergeInProgress => gated.merge.require_in_progress()?,
            Requirement::CleanTrackedTree => {
                let status = git.worktree_status(false)?;
                if !status.is_clean() {
                    return Err(EngineError::UncommittedChanges(format!(
                        "{} staged, {} unstaged",
                        status.staged, status.unstaged
                    )));
                }
            }
            Requirement::OnBranch => {
                gated.branch()?;
            }
            Requirement::HasCommits => {
                gated.head()?;
            }
        }
    }

    debug!(requirements = set.name, "gate passed");
    Ok(gated)
}

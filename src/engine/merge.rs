//! engine::merge
//!
//! Merge state and conflict resolution.
//!
//! # State Machine
//!
//! ```text
//! Clean --(pull produces conflicts)--> InProgress{conflicted}
//! InProgress --(abort)--> Clean
//! InProgress --(resolve each path)--> InProgress{[]} --(commit)--> Clean
//! ```
//!
//! The state is read from the repository (merge heads plus index
//! conflicts) rather than tracked in memory, so it survives restarts and
//! always matches what is on disk.

use serde::{Deserialize, Serialize};

use super::error::EngineError;
use crate::git::{ConflictSide, Git, GitState};

/// Merge state of a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MergeState {
    Clean,
    InProgress {
        /// Paths still awaiting resolution
        conflicted: Vec<String>,
    },
}

impl MergeState {
    /// Read the merge state of `git`.
    pub fn load(git: &Git) -> Result<Self, EngineError> {
        let conflicted = git.conflicted_paths()?;
        if git.state() == GitState::Merge || !conflicted.is_empty() {
            Ok(MergeState::InProgress { conflicted })
        } else {
            Ok(MergeState::Clean)
        }
    }

    pub fn is_in_progress(&self) -> bool {
        matches!(self, MergeState::InProgress { .. })
    }

    /// Paths awaiting resolution (empty when clean).
    pub fn conflicted(&self) -> &[String] {
        match self {
            MergeState::Clean => &[],
            MergeState::InProgress { conflicted } => conflicted,
        }
    }

    /// Fail with `MergeInProgress` unless clean.
    pub fn require_clean(&self) -> Result<(), EngineError> {
        match self {
            MergeState::Clean => Ok(()),
            MergeState::InProgress { conflicted } => Err(EngineError::MergeInProgress {
                unresolved: conflicted.clone(),
            }),
        }
    }

    /// Fail with `NoMergeInProgress` when clean.
    pub fn require_in_progress(&self) -> Result<(), EngineError> {
        if self.is_in_progress() {
            Ok(())
        } else {
            Err(EngineError::NoMergeInProgress)
        }
    }

    /// Fail with `MergeInProgress` while paths remain unresolved.
    pub fn require_committable(&self) -> Result<(), EngineError> {
        match self.conflicted() {
            [] => Ok(()),
            unresolved => Err(EngineError::MergeInProgress {
                unresolved: unresolved.to_vec(),
            }),
        }
    }
}

/// How to resolve one conflicted path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Keep the current branch's version
    Ours,
    /// Take the incoming version
    Theirs,
    /// Use this content
    Content(String),
}

/// Applies resolutions to conflicted paths of one repository.
#[derive(Debug)]
pub struct ConflictResolver<'a> {
    git: &'a Git,
}

impl<'a> ConflictResolver<'a> {
    pub fn new(git: &'a Git) -> Self {
        Self { git }
    }

    /// Current merge state.
    pub fn state(&self) -> Result<MergeState, EngineError> {
        MergeState::load(self.git)
    }

    /// Resolve `path` and stage the result. Returns the new state.
    ///
    /// A side that deleted the file resolves to a staged deletion.
    pub fn resolve(&self, path: &str, resolution: &Resolution) -> Result<MergeState, EngineError> {
        let state = self.state()?;
        state.require_in_progress()?;
        if !state.conflicted().iter().any(|p| p == path) {
            return Err(EngineError::NotConflicted(path.to_string()));
        }

        let content = match resolution {
            Resolution::Ours => self.git.conflict_side(path, ConflictSide::Ours)?,
            Resolution::Theirs => self.git.conflict_side(path, ConflictSide::Theirs)?,
            Resolution::Content(text) => Some(text.clone().into_bytes()),
        };

        match content {
            Some(bytes) => self.git.write_worktree_file(path, &bytes)?,
            None => self.git.remove_worktree_file(path)?,
        }
        self.git.stage(&[path.to_string()])?;

        self.state()
    }

    /// Discard the merge: reset tracked files and the index to the
    /// pre-merge HEAD and clear merge state.
    pub fn abort(&self) -> Result<(), EngineError> {
        self.state()?.require_in_progress()?;
        self.git.abort_merge()?;
        Ok(())
    }
}

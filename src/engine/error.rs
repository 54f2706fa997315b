//! engine::error
//!
//! The engine's error type and the taxonomy it reports to callers.
//!
//! Every failure from a lower layer (git, store, secrets) is mapped here at
//! the call boundary, so callers only ever see [`EngineError`]. Each variant
//! belongs to one [`ErrorKind`] and carries an HTTP-style status hint.

use serde::Serialize;
use thiserror::Error;

use crate::core::active::ActiveError;
use crate::core::config::ConfigError;
use crate::core::registry::{RegistryError, StoreError};
use crate::core::types::{BranchName, ProjectName, TypeError};
use crate::git::GitError;
use crate::secrets::SecretError;

/// Coarse error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    /// Histories disagree (non-fast-forward, unrelated, unmerged)
    Conflict,
    /// Operation not allowed in the current merge or staging state
    InvalidState,
    /// Remote could not be reached in time
    Unreachable,
    StorageUnavailable,
    PermissionDenied,
    InvalidInput,
    Internal,
}

/// Errors returned by engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("project '{0}' already has files or commits")]
    NotEmpty(ProjectName),

    #[error("project '{0}' is active and busy")]
    ActiveProjectBusy(ProjectName),

    #[error("uncommitted changes: {0}")]
    UncommittedChanges(String),

    #[error("branch '{0}' is not fully merged")]
    NotFullyMerged(BranchName),

    #[error("cannot delete the current branch '{0}'")]
    CurrentBranch(BranchName),

    #[error("nothing staged to commit")]
    NothingStaged,

    #[error("merge in progress ({} unresolved)", unresolved.len())]
    MergeInProgress { unresolved: Vec<String> },

    #[error("no merge in progress")]
    NoMergeInProgress,

    #[error("path '{0}' is not conflicted")]
    NotConflicted(String),

    #[error("refusing to merge unrelated histories")]
    UnrelatedHistories,

    #[error("remote has diverged, pull first: {0}")]
    NonFastForward(String),

    #[error("remote unreachable: {0}")]
    RemoteUnreachable(String),

    #[error("{0} timed out")]
    Timeout(String),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// The taxonomy category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::NotFound(_) => ErrorKind::NotFound,
            EngineError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            EngineError::NotFullyMerged(_)
            | EngineError::UnrelatedHistories
            | EngineError::NonFastForward(_) => ErrorKind::Conflict,
            EngineError::NotEmpty(_)
            | EngineError::ActiveProjectBusy(_)
            | EngineError::UncommittedChanges(_)
            | EngineError::CurrentBranch(_)
            | EngineError::NothingStaged
            | EngineError::MergeInProgress { .. }
            | EngineError::NoMergeInProgress
            | EngineError::NotConflicted(_) => ErrorKind::InvalidState,
            EngineError::RemoteUnreachable(_) | EngineError::Timeout(_) => ErrorKind::Unreachable,
            EngineError::StorageUnavailable(_) => ErrorKind::StorageUnavailable,
            EngineError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            EngineError::InvalidArgument(_) => ErrorKind::InvalidInput,
            EngineError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// HTTP-style status hint.
    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::NotFound => 404,
            ErrorKind::AlreadyExists | ErrorKind::Conflict => 409,
            ErrorKind::InvalidState | ErrorKind::InvalidInput => 400,
            ErrorKind::Unreachable => match self {
                EngineError::Timeout(_) => 504,
                _ => 502,
            },
            ErrorKind::StorageUnavailable => 503,
            ErrorKind::PermissionDenied => 403,
            ErrorKind::Internal => 500,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::NotFound(_) => "not_found",
            EngineError::AlreadyExists(_) => "already_exists",
            EngineError::NotEmpty(_) => "not_empty",
            EngineError::ActiveProjectBusy(_) => "active_project_busy",
            EngineError::UncommittedChanges(_) => "uncommitted_changes",
            EngineError::NotFullyMerged(_) => "not_fully_merged",
            EngineError::CurrentBranch(_) => "current_branch",
            EngineError::NothingStaged => "nothing_staged",
            EngineError::MergeInProgress { .. } => "merge_in_progress",
            EngineError::NoMergeInProgress => "no_merge_in_progress",
            EngineError::NotConflicted(_) => "not_conflicted",
            EngineError::UnrelatedHistories => "unrelated_histories",
            EngineError::NonFastForward(_) => "non_fast_forward",
            EngineError::RemoteUnreachable(_) => "remote_unreachable",
            EngineError::Timeout(_) => "timeout",
            EngineError::StorageUnavailable(_) => "storage_unavailable",
            EngineError::PermissionDenied(_) => "permission_denied",
            EngineError::InvalidArgument(_) => "invalid_argument",
            EngineError::Internal(_) => "internal",
        }
    }
}

impl From<GitError> for EngineError {
    fn from(err: GitError) -> Self {
        match err {
            GitError::RefNotFound { refname } => EngineError::NotFound(format!("ref '{refname}'")),
            GitError::ObjectNotFound { oid } => EngineError::NotFound(format!("object '{oid}'")),
            GitError::PathNotFound { path } => EngineError::NotFound(format!("path '{path}'")),
            GitError::AlreadyExists { name } => EngineError::AlreadyExists(format!("'{name}'")),
            GitError::InvalidPath { .. }
            | GitError::InvalidOid { .. }
            | GitError::InvalidRefName { .. }
            | GitError::InvalidUtf8 { .. }
            | GitError::NoIdentity => EngineError::InvalidArgument(err.to_string()),
            GitError::NotFastForward { message } => EngineError::NonFastForward(message),
            GitError::Rejected { message } | GitError::Auth { message } => {
                EngineError::PermissionDenied(message)
            }
            GitError::Network { message } => EngineError::RemoteUnreachable(message),
            GitError::Cancelled => EngineError::Timeout("transfer".to_string()),
            GitError::NotARepo { .. }
            | GitError::BareRepo
            | GitError::Locked { .. }
            | GitError::AccessError { .. } => EngineError::StorageUnavailable(err.to_string()),
            GitError::Internal { message } => EngineError::Internal(message),
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        EngineError::StorageUnavailable(err.to_string())
    }
}

impl From<RegistryError> for EngineError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(name) => EngineError::NotFound(format!("project '{name}'")),
            RegistryError::AlreadyExists(name) => {
                EngineError::AlreadyExists(format!("project '{name}'"))
            }
            RegistryError::Store(e) => e.into(),
        }
    }
}

impl From<ActiveError> for EngineError {
    fn from(err: ActiveError) -> Self {
        match err {
            ActiveError::NotFound(name) => EngineError::NotFound(format!("project '{name}'")),
            ActiveError::Switch { .. } => EngineError::StorageUnavailable(err.to_string()),
            ActiveError::Store(e) => e.into(),
        }
    }
}

impl From<ConfigError> for EngineError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::InvalidValue(_) | ConfigError::ParseError { .. } => {
                EngineError::InvalidArgument(err.to_string())
            }
            _ => EngineError::StorageUnavailable(err.to_string()),
        }
    }
}

impl From<TypeError> for EngineError {
    fn from(err: TypeError) -> Self {
        EngineError::InvalidArgument(err.to_string())
    }
}

impl From<SecretError> for EngineError {
    fn from(err: SecretError) -> Self {
        match err {
            SecretError::PermissionDenied(_) => EngineError::PermissionDenied(err.to_string()),
            SecretError::NotFound(key) => EngineError::NotFound(format!("secret '{key}'")),
            _ => EngineError::StorageUnavailable(err.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for EngineError {
    fn from(err: tokio::task::JoinError) -> Self {
        EngineError::Internal(format!("operation task failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_kind() {
        let demo = ProjectName::new("demo").unwrap();
        assert_eq!(EngineError::NotFound("x".into()).status_code(), 404);
        assert_eq!(EngineError::AlreadyExists("x".into()).status_code(), 409);
        assert_eq!(EngineError::NonFastForward("x".into()).status_code(), 409);
        assert_eq!(EngineError::NothingStaged.status_code(), 400);
        assert_eq!(EngineError::ActiveProjectBusy(demo).status_code(), 400);
        assert_eq!(EngineError::RemoteUnreachable("x".into()).status_code(), 502);
        assert_eq!(EngineError::Timeout("pull".into()).status_code(), 504);
        assert_eq!(EngineError::StorageUnavailable("x".into()).status_code(), 503);
        assert_eq!(EngineError::PermissionDenied("x".into()).status_code(), 403);
        assert_eq!(EngineError::Internal("x".into()).status_code(), 500);
    }

    #[test]
    fn merge_errors_are_invalid_state() {
        let err = EngineError::MergeInProgress {
            unresolved: vec!["a.txt".into()],
        };
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert_eq!(err.code(), "merge_in_progress");
        assert!(err.to_string().contains("1 unresolved"));
        assert_eq!(EngineError::NoMergeInProgress.kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn git_errors_map_into_taxonomy() {
        let err: EngineError = GitError::NotFastForward {
            message: "diverged".into(),
        }
        .into();
        assert!(matches!(err, EngineError::NonFastForward(_)));

        let err: EngineError = GitError::Network {
            message: "offline".into(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Unreachable);

        let err: EngineError = GitError::Cancelled.into();
        assert!(matches!(err, EngineError::Timeout(_)));

        let err: EngineError = GitError::PathNotFound {
            path: "a.txt".into(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn registry_errors_name_the_project() {
        let err: EngineError = RegistryError::NotFound(ProjectName::new("demo").unwrap()).into();
        assert_eq!(err.to_string(), "project 'demo' not found");
    }
}

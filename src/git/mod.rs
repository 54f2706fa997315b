//! git
//!
//! Single interface for all Git operations.
//!
//! # Architecture
//!
//! This module is the **ONLY doorway** to Git. All repository reads and writes
//! flow through [`Git`], one handle per project working tree. No other module
//! should import `git2`; callers see plain data types and [`GitError`].
//!
//! # Responsibilities
//!
//! - Repository creation, opening and cloning
//! - Status, file content and structured diffs
//! - Branches, staging and commits
//! - Remotes, fetch/push transfers and integration of fetched history
//! - Merge state: conflicted paths, conflict sides, abort
//!
//! # Invariants
//!
//! - No other module calls git2 directly
//! - All operations return strong types (Oid, BranchName, RemoteName)
//! - Checkouts are safe: local modifications are never overwritten silently
//!
//! # Example
//!
//! ```ignore
//! use gitdeck::git::{Git, DiffTarget};
//! use std::path::Path;
//!
//! let git = Git::open(Path::new("/data/gitdeck/projects/demo"))?;
//! let diff = git.diff_file("README.md", &DiffTarget::Unstaged)?;
//! for hunk in diff.hunks {
//!     println!("{}", hunk.header);
//! }
//! ```

mod diff;
mod interface;
mod remote;

pub use diff::{DiffLine, DiffStat, DiffTarget, FileDiff, Hunk, LineOrigin};
pub use interface::{
    BranchInfo, BranchKind, ChangeKind, CommitInfo, ConflictSide, FileEntry, FileSource, Git,
    GitError, GitState, StatusSnapshot, WorktreeStatus,
};
pub use remote::{Credentials, Integration, RemoteInfo, Transfer};

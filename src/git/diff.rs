//! git::diff
//!
//! Structured diffs. Callers get hunks and lines with line numbers, never
//! patch text to reparse.

use serde::Serialize;

use super::interface::{check_relative, to_git2, ChangeKind, Git, GitError};
use crate::core::types::Oid;

/// What to compare.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffTarget {
    /// Index against working tree
    Unstaged,
    /// HEAD against index
    Staged,
    /// Between two commits; `from` defaults to the first parent of `to`
    Commits { from: Option<Oid>, to: Oid },
}

/// Kind of a diff line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LineOrigin {
    Context,
    Addition,
    Deletion,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffLine {
    pub origin: LineOrigin,
    pub content: String,
    pub old_lineno: Option<u32>,
    pub new_lineno: Option<u32>,
}

/// One hunk with its line ranges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Hunk {
    pub old_start: u32,
    pub old_lines: u32,
    pub new_start: u32,
    pub new_lines: u32,
    pub header: String,
    pub lines: Vec<DiffLine>,
}

/// Diff of a single file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileDiff {
    pub path: String,
    /// `None` when the file is unchanged
    pub change: Option<ChangeKind>,
    pub binary: bool,
    pub hunks: Vec<Hunk>,
}

/// Aggregate line counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiffStat {
    pub files_changed: usize,
    pub insertions: usize,
    pub deletions: usize,
}

fn delta_kind(delta: git2::Delta) -> Option<ChangeKind> {
    match delta {
        git2::Delta::Added | git2::Delta::Copied => Some(ChangeKind::Added),
        git2::Delta::Deleted => Some(ChangeKind::Deleted),
        git2::Delta::Modified => Some(ChangeKind::Modified),
        git2::Delta::Renamed => Some(ChangeKind::Renamed),
        git2::Delta::Typechange => Some(ChangeKind::TypeChanged),
        git2::Delta::Untracked => Some(ChangeKind::Untracked),
        git2::Delta::Conflicted => Some(ChangeKind::Conflicted),
        git2::Delta::Unmodified | git2::Delta::Ignored | git2::Delta::Unreadable => None,
    }
}

impl Git {
    fn commit_tree(&self, oid: &Oid) -> Result<git2::Tree<'_>, GitError> {
        self.repo
            .find_commit(to_git2(oid)?)
            .and_then(|c| c.tree())
            .map_err(|e| GitError::from_git2(e, oid.as_str()))
    }

    fn build_diff(
        &self,
        target: &DiffTarget,
        opts: &mut git2::DiffOptions,
    ) -> Result<git2::Diff<'_>, GitError> {
        let diff = match target {
            DiffTarget::Unstaged => {
                opts.include_untracked(true).show_untracked_content(true);
                self.repo.diff_index_to_workdir(None, Some(opts))?
            }
            DiffTarget::Staged => {
                let head_tree = match self.head_commit()? {
                    Some(head) => Some(head.tree()?),
                    None => None,
                };
                self.repo
                    .diff_tree_to_index(head_tree.as_ref(), None, Some(opts))?
            }
            DiffTarget::Commits { from, to } => {
                let new_tree = self.commit_tree(to)?;
                let old_tree = match from {
                    Some(from) => Some(self.commit_tree(from)?),
                    None => {
                        let commit = self
                            .repo
                            .find_commit(to_git2(to)?)
                            .map_err(|e| GitError::from_git2(e, to.as_str()))?;
                        match commit.parent(0) {
                            Ok(parent) => Some(parent.tree()?),
                            Err(_) => None,
                        }
                    }
                };
                self.repo
                    .diff_tree_to_tree(old_tree.as_ref(), Some(&new_tree), Some(opts))?
            }
        };
        Ok(diff)
    }

    /// Structured diff of one path.
    pub fn diff_file(&self, path: &str, target: &DiffTarget) -> Result<FileDiff, GitError> {
        check_relative(path)?;
        let mut opts = git2::DiffOptions::new();
        opts.pathspec(path).disable_pathspec_match(true);
        let diff = self.build_diff(target, &mut opts)?;

        let mut file = FileDiff {
            path: path.to_string(),
            change: None,
            binary: false,
            hunks: Vec::new(),
        };
        for delta in diff.deltas() {
            file.change = delta_kind(delta.status());
            file.binary |= delta.flags().is_binary();
        }

        diff.print(git2::DiffFormat::Patch, |delta, hunk, line| {
            file.binary |= delta.flags().is_binary();
            let origin = match line.origin() {
                'H' => {
                    if let Some(h) = hunk {
                        file.hunks.push(Hunk {
                            old_start: h.old_start(),
                            old_lines: h.old_lines(),
                            new_start: h.new_start(),
                            new_lines: h.new_lines(),
                            header: String::from_utf8_lossy(h.header()).trim_end().to_string(),
                            lines: Vec::new(),
                        });
                    }
                    return true;
                }
                ' ' => LineOrigin::Context,
                '+' => LineOrigin::Addition,
                '-' => LineOrigin::Deletion,
                // File headers, binary markers, end-of-file newline notes
                _ => return true,
            };
            if let Some(current) = file.hunks.last_mut() {
                current.lines.push(DiffLine {
                    origin,
                    content: String::from_utf8_lossy(line.content())
                        .trim_end_matches('\n')
                        .to_string(),
                    old_lineno: line.old_lineno(),
                    new_lineno: line.new_lineno(),
                });
            }
            true
        })?;

        Ok(file)
    }

    /// Line counts and changed paths of a commit against its first parent.
    pub fn commit_stats(&self, oid: &Oid) -> Result<(DiffStat, Vec<String>), GitError> {
        let target = DiffTarget::Commits {
            from: None,
            to: oid.clone(),
        };
        let mut opts = git2::DiffOptions::new();
        let diff = self.build_diff(&target, &mut opts)?;
        let stats = diff.stats()?;

        let mut files = Vec::new();
        for delta in diff.deltas() {
            let path = delta.new_file().path().or_else(|| delta.old_file().path());
            if let Some(path) = path {
                files.push(path.to_string_lossy().into_owned());
            }
        }

        Ok((
            DiffStat {
                files_changed: stats.files_changed(),
                insertions: stats.insertions(),
                deletions: stats.deletions(),
            },
            files,
        ))
    }
}

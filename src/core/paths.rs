//! core::paths
//!
//! Centralized path routing for gitdeck storage locations.
//!
//! # Storage Layout
//!
//! All gitdeck data is stored under the configured workspace directory:
//! - `registry.json` - Project registry
//! - `active.json` - Per-user active project pointers
//! - `store.lock` - Exclusive lock guarding the two files above
//! - `secrets.toml` - Remote credentials (file secret provider, mode 0600)
//! - `projects/<name>/` - One working tree per project
//!
//! **Hard rule:** No code outside this module may join paths under the
//! workspace by hand. Everything routes through [`DeckPaths`].
//!
//! # Example
//!
//! ```
//! use gitdeck::core::paths::DeckPaths;
//! use gitdeck::core::types::ProjectName;
//! use std::path::PathBuf;
//!
//! let paths = DeckPaths::new(PathBuf::from("/data/gitdeck"));
//! let demo = ProjectName::new("demo").unwrap();
//!
//! assert_eq!(paths.registry_path(), PathBuf::from("/data/gitdeck/registry.json"));
//! assert_eq!(paths.project_dir(&demo), PathBuf::from("/data/gitdeck/projects/demo"));
//! ```

use std::path::{Path, PathBuf};

use crate::core::types::ProjectName;

/// Centralized path routing for gitdeck storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeckPaths {
    /// Root of all gitdeck data.
    pub workspace: PathBuf,
}

impl DeckPaths {
    /// Create paths rooted at `workspace`.
    pub fn new(workspace: PathBuf) -> Self {
        Self { workspace }
    }

    /// The workspace root.
    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    /// `<workspace>/registry.json`.
    pub fn registry_path(&self) -> PathBuf {
        self.workspace.join("registry.json")
    }

    /// `<workspace>/active.json`.
    pub fn active_path(&self) -> PathBuf {
        self.workspace.join("active.json")
    }

    /// `<workspace>/store.lock`.
    pub fn store_lock_path(&self) -> PathBuf {
        self.workspace.join("store.lock")
    }

    /// `<workspace>/secrets.toml`.
    pub fn secrets_path(&self) -> PathBuf {
        self.workspace.join("secrets.toml")
    }

    /// `<workspace>/projects`.
    pub fn projects_dir(&self) -> PathBuf {
        self.workspace.join("projects")
    }

    /// `<workspace>/projects/<name>`.
    ///
    /// Safe to join because [`ProjectName`] cannot contain separators or
    /// start with a dot.
    pub fn project_dir(&self, name: &ProjectName) -> PathBuf {
        self.projects_dir().join(name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_files_live_under_workspace() {
        let paths = DeckPaths::new(PathBuf::from("/ws"));
        let name = ProjectName::new("p1").unwrap();

        for path in [
            paths.registry_path(),
            paths.active_path(),
            paths.store_lock_path(),
            paths.secrets_path(),
            paths.project_dir(&name),
        ] {
            assert!(path.starts_with(paths.workspace()), "{}", path.display());
        }
    }

    #[test]
    fn project_dirs_are_distinct() {
        let paths = DeckPaths::new(PathBuf::from("/ws"));
        let a = ProjectName::new("a").unwrap();
        let b = ProjectName::new("b").unwrap();
        assert_ne!(paths.project_dir(&a), paths.project_dir(&b));
        assert_eq!(paths.project_dir(&a).parent(), Some(paths.projects_dir().as_path()));
    }
}

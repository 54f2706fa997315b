//! core::registry
//!
//! Durable mapping of project names to project metadata.
//!
//! # Modules
//!
//! - [`schema`] - Persisted document types (v1)
//! - [`store`] - Atomic JSON-file persistence
//!
//! # Architecture
//!
//! The registry owns [`Project`] records. It knows nothing about working
//! trees or locks; the engine composes it with the git layer and the
//! operation serializer to implement create/initialise/delete.
//!
//! # Example
//!
//! ```ignore
//! let registry = ProjectRegistry::new(RegistryStore::new(paths));
//! for summary in registry.list()? {
//!     println!("{}", summary.name);
//! }
//! ```

pub mod schema;
pub mod store;

pub use schema::{Project, ProjectSummary, Remote};
pub use store::{RegistryStore, StoreError};

use thiserror::Error;

use crate::core::types::ProjectName;

/// Errors from registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("project not found: {0}")]
    NotFound(ProjectName),

    #[error("project already exists: {0}")]
    AlreadyExists(ProjectName),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The project registry.
#[derive(Debug, Clone)]
pub struct ProjectRegistry {
    store: RegistryStore,
}

impl ProjectRegistry {
    /// Create a registry over `store`.
    pub fn new(store: RegistryStore) -> Self {
        Self { store }
    }

    /// The underlying store.
    pub fn store(&self) -> &RegistryStore {
        &self.store
    }

    /// List all projects ordered by name.
    pub fn list(&self) -> Result<Vec<ProjectSummary>, RegistryError> {
        let doc = self.store.read_registry()?;
        Ok(doc.projects.values().map(Project::summary).collect())
    }

    /// Get a project by name.
    pub fn get(&self, name: &ProjectName) -> Result<Project, RegistryError> {
        let mut doc = self.store.read_registry()?;
        doc.projects
            .remove(name)
            .ok_or_else(|| RegistryError::NotFound(name.clone()))
    }

    /// Whether a project is registered.
    pub fn contains(&self, name: &ProjectName) -> Result<bool, RegistryError> {
        Ok(self.store.read_registry()?.projects.contains_key(name))
    }

    /// Insert a new project.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::AlreadyExists`] if the name is taken
    pub fn insert(&self, project: Project) -> Result<Project, RegistryError> {
        self.store.update_registry(|doc| {
            if doc.projects.contains_key(&project.name) {
                return Err(RegistryError::AlreadyExists(project.name.clone()));
            }
            doc.projects.insert(project.name.clone(), project.clone());
            Ok(project)
        })
    }

    /// Modify an existing project in place and return the stored result.
    pub fn update(
        &self,
        name: &ProjectName,
        f: impl FnOnce(&mut Project),
    ) -> Result<Project, RegistryError> {
        self.store.update_registry(|doc| {
            let project = doc
                .projects
                .get_mut(name)
                .ok_or_else(|| RegistryError::NotFound(name.clone()))?;
            f(project);
            Ok(project.clone())
        })
    }

    /// Remove a project record and clear every active pointer to it.
    ///
    /// Returns the removed record.
    pub fn remove(&self, name: &ProjectName) -> Result<Project, RegistryError> {
        self.store.update_both(|registry, active| {
            let project = registry
                .projects
                .remove(name)
                .ok_or_else(|| RegistryError::NotFound(name.clone()))?;
            active.active.retain(|_, project_name| project_name != name);
            Ok(project)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::paths::DeckPaths;
    use crate::core::types::{UserId, UtcTimestamp};
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn registry() -> (TempDir, ProjectRegistry) {
        let temp = TempDir::new().unwrap();
        let store = RegistryStore::new(DeckPaths::new(temp.path().to_path_buf()));
        (temp, ProjectRegistry::new(store))
    }

    fn project(name: &str) -> Project {
        Project {
            name: ProjectName::new(name).unwrap(),
            description: format!("{name} project"),
            path: PathBuf::from(name),
            created_at: UtcTimestamp::now(),
            remotes: Vec::new(),
        }
    }

    #[test]
    fn list_is_ordered_by_name() {
        let (_temp, registry) = registry();
        for name in ["zeta", "alpha", "mid"] {
            registry.insert(project(name)).unwrap();
        }

        let names: Vec<_> = registry
            .list()
            .unwrap()
            .into_iter()
            .map(|s| s.name.to_string())
            .collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn insert_rejects_duplicates() {
        let (_temp, registry) = registry();
        registry.insert(project("demo")).unwrap();
        assert!(matches!(
            registry.insert(project("demo")),
            Err(RegistryError::AlreadyExists(_))
        ));
    }

    #[test]
    fn get_missing_is_not_found() {
        let (_temp, registry) = registry();
        let name = ProjectName::new("nope").unwrap();
        assert!(matches!(registry.get(&name), Err(RegistryError::NotFound(_))));
        assert!(!registry.contains(&name).unwrap());
    }

    #[test]
    fn update_modifies_record() {
        let (_temp, registry) = registry();
        let name = registry.insert(project("demo")).unwrap().name;

        let updated = registry
            .update(&name, |p| p.description = "changed".into())
            .unwrap();
        assert_eq!(updated.description, "changed");
        assert_eq!(registry.get(&name).unwrap().description, "changed");
    }

    #[test]
    fn remove_clears_active_pointers() {
        let (_temp, registry) = registry();
        let name = registry.insert(project("demo")).unwrap().name;
        registry
            .store()
            .update_active(|doc| {
                doc.active.insert(UserId::new("bob").unwrap(), name.clone());
                Ok::<_, StoreError>(())
            })
            .unwrap();

        registry.remove(&name).unwrap();

        assert!(registry.list().unwrap().is_empty());
        assert!(registry.store().read_active().unwrap().active.is_empty());
    }
}

//! core::active
//!
//! Per-user pointer to the currently active project.
//!
//! # Architecture
//!
//! Pointers persist in `active.json` through the [`RegistryStore`]. Making a
//! project active runs a [`WorkingTreeSwitch`] side effect and then records
//! the pointer, both under the project's exclusive lock. The switch
//! is injected at construction so tests can observe it.
//!
//! # Invariants
//!
//! - A pointer, if present, names a registered project (deletion clears
//!   pointers in the same store write)
//! - Setting the project that is already active performs no switch
//! - Calls for one user are linearized: a `set` in flight completes,
//!   switch included, before a later `get` or `set` for that user runs
//! - Different users never contend

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

use crate::core::ops::OperationSerializer;
use crate::core::registry::{Project, ProjectRegistry, RegistryError, StoreError};
use crate::core::types::{ProjectName, UserId};
use crate::git::Git;

/// Errors from active-project tracking.
#[derive(Debug, Error)]
pub enum ActiveError {
    #[error("project not found: {0}")]
    NotFound(ProjectName),

    #[error("failed to switch working tree for {project}: {message}")]
    Switch {
        project: ProjectName,
        message: String,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<RegistryError> for ActiveError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(name) => ActiveError::NotFound(name),
            RegistryError::AlreadyExists(name) => ActiveError::Switch {
                message: format!("unexpected duplicate project {name}"),
                project: name,
            },
            RegistryError::Store(e) => ActiveError::Store(e),
        }
    }
}

/// Side effect run when a project becomes a user's active project.
#[async_trait]
pub trait WorkingTreeSwitch: Send + Sync {
    /// Bring `project`'s working tree into a usable state.
    async fn switch_to(&self, project: &Project) -> Result<(), ActiveError>;
}

/// Default switch: refresh the working tree from HEAD without overwriting
/// local modifications.
#[derive(Debug, Default, Clone, Copy)]
pub struct GitCheckout;

#[async_trait]
impl WorkingTreeSwitch for GitCheckout {
    async fn switch_to(&self, project: &Project) -> Result<(), ActiveError> {
        let path = project.path.clone();
        let name = project.name.clone();
        let switch_err = |message: String| ActiveError::Switch {
            project: name.clone(),
            message,
        };

        tokio::task::spawn_blocking(move || Git::open(&path)?.refresh_worktree())
            .await
            .map_err(|e| switch_err(e.to_string()))?
            .map_err(|e| switch_err(e.to_string()))
    }
}

/// Tracks one active project per user.
pub struct ActiveProjectTracker {
    registry: ProjectRegistry,
    serializer: Arc<OperationSerializer>,
    switch: Arc<dyn WorkingTreeSwitch>,
    users: Mutex<HashMap<UserId, Arc<tokio::sync::Mutex<()>>>>,
}

impl std::fmt::Debug for ActiveProjectTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveProjectTracker")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl ActiveProjectTracker {
    /// Create a tracker.
    pub fn new(
        registry: ProjectRegistry,
        serializer: Arc<OperationSerializer>,
        switch: Arc<dyn WorkingTreeSwitch>,
    ) -> Self {
        Self {
            registry,
            serializer,
            switch,
            users: Mutex::new(HashMap::new()),
        }
    }

    fn user_lock(&self, user: &UserId) -> Arc<tokio::sync::Mutex<()>> {
        let mut users = self.users.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(users.entry(user.clone()).or_default())
    }

    /// The name of `user`'s active project, if any.
    pub async fn active_name(&self, user: &UserId) -> Result<Option<ProjectName>, ActiveError> {
        let lock = self.user_lock(user);
        let _held = lock.lock().await;
        let Some(name) = self.registry.store().read_active()?.active.remove(user) else {
            return Ok(None);
        };
        Ok(self.registry.contains(&name)?.then_some(name))
    }

    /// `user`'s active project, if any.
    pub async fn get(&self, user: &UserId) -> Result<Option<Project>, ActiveError> {
        let lock = self.user_lock(user);
        let _held = lock.lock().await;
        let Some(name) = self.registry.store().read_active()?.active.remove(user) else {
            return Ok(None);
        };
        match self.registry.get(&name) {
            Ok(project) => Ok(Some(project)),
            Err(RegistryError::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Make `name` the active project of `user`.
    ///
    /// Returns the project. When it is already active nothing else happens.
    pub async fn set(&self, user: &UserId, name: &ProjectName) -> Result<Project, ActiveError> {
        let lock = self.user_lock(user);
        let _held = lock.lock().await;

        let project = self.registry.get(name)?;
        let current = self.registry.store().read_active()?.active.remove(user);
        if current.as_ref() == Some(name) {
            debug!(user = %user, project = %name, "project already active, skipping switch");
            return Ok(project);
        }

        // The pointer is written before the guard drops so a concurrent
        // delete either sees it or removes the project first.
        let _guard = self.serializer.exclusive(name).await;
        self.switch.switch_to(&project).await?;
        self.registry.store().update_both(|registry, doc| {
            if !registry.projects.contains_key(name) {
                return Err(ActiveError::NotFound(name.clone()));
            }
            doc.active.insert(user.clone(), name.clone());
            Ok(())
        })?;
        info!(user = %user, project = %name, "active project set");
        Ok(project)
    }

    /// Users whose active project is `name`.
    pub fn users_of(&self, name: &ProjectName) -> Result<Vec<UserId>, ActiveError> {
        let doc = self.registry.store().read_active()?;
        Ok(doc
            .active
            .into_iter()
            .filter(|(_, project)| project == name)
            .map(|(user, _)| user)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::paths::DeckPaths;
    use crate::core::registry::RegistryStore;
    use crate::core::types::UtcTimestamp;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    #[derive(Default)]
    struct CountingSwitch {
        calls: AtomicUsize,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl WorkingTreeSwitch for CountingSwitch {
        async fn switch_to(&self, _project: &Project) -> Result<(), ActiveError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingSwitch;

    #[async_trait]
    impl WorkingTreeSwitch for FailingSwitch {
        async fn switch_to(&self, project: &Project) -> Result<(), ActiveError> {
            Err(ActiveError::Switch {
                project: project.name.clone(),
                message: "disk on fire".into(),
            })
        }
    }

    fn setup(switch: Arc<dyn WorkingTreeSwitch>) -> (TempDir, ProjectRegistry, ActiveProjectTracker) {
        let temp = TempDir::new().unwrap();
        let registry = ProjectRegistry::new(RegistryStore::new(DeckPaths::new(
            temp.path().to_path_buf(),
        )));
        for name in ["alpha", "beta"] {
            registry
                .insert(Project {
                    name: ProjectName::new(name).unwrap(),
                    description: String::new(),
                    path: PathBuf::from(name),
                    created_at: UtcTimestamp::now(),
                    remotes: Vec::new(),
                })
                .unwrap();
        }
        let tracker = ActiveProjectTracker::new(
            registry.clone(),
            Arc::new(OperationSerializer::new()),
            switch,
        );
        (temp, registry, tracker)
    }

    fn user(id: &str) -> UserId {
        UserId::new(id).unwrap()
    }

    fn name(n: &str) -> ProjectName {
        ProjectName::new(n).unwrap()
    }

    #[tokio::test]
    async fn get_without_pointer_is_none() {
        let (_temp, _registry, tracker) = setup(Arc::new(CountingSwitch::default()));
        assert!(tracker.get(&user("alice")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn setting_same_project_twice_switches_once() {
        let switch = Arc::new(CountingSwitch::default());
        let (_temp, _registry, tracker) = setup(switch.clone());

        tracker.set(&user("alice"), &name("alpha")).await.unwrap();
        tracker.set(&user("alice"), &name("alpha")).await.unwrap();

        assert_eq!(switch.calls.load(Ordering::SeqCst), 1);
        let active = tracker.get(&user("alice")).await.unwrap().unwrap();
        assert_eq!(active.name, name("alpha"));
    }

    #[tokio::test]
    async fn switching_projects_runs_switch_each_time() {
        let switch = Arc::new(CountingSwitch::default());
        let (_temp, _registry, tracker) = setup(switch.clone());

        tracker.set(&user("alice"), &name("alpha")).await.unwrap();
        tracker.set(&user("alice"), &name("beta")).await.unwrap();
        tracker.set(&user("alice"), &name("alpha")).await.unwrap();

        assert_eq!(switch.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn unknown_project_is_not_found() {
        let switch = Arc::new(CountingSwitch::default());
        let (_temp, _registry, tracker) = setup(switch.clone());

        let result = tracker.set(&user("alice"), &name("missing")).await;
        assert!(matches!(result, Err(ActiveError::NotFound(_))));
        assert_eq!(switch.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_switch_leaves_pointer_unchanged() {
        let (_temp, _registry, tracker) = setup(Arc::new(FailingSwitch));

        assert!(tracker.set(&user("alice"), &name("alpha")).await.is_err());
        assert!(tracker.active_name(&user("alice")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn users_are_independent() {
        let (_temp, _registry, tracker) = setup(Arc::new(CountingSwitch::default()));

        tracker.set(&user("alice"), &name("alpha")).await.unwrap();
        tracker.set(&user("bob"), &name("beta")).await.unwrap();

        assert_eq!(
            tracker.active_name(&user("alice")).await.unwrap(),
            Some(name("alpha"))
        );
        assert_eq!(
            tracker.active_name(&user("bob")).await.unwrap(),
            Some(name("beta"))
        );
        assert_eq!(tracker.users_of(&name("beta")).unwrap(), vec![user("bob")]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn get_waits_for_set_in_flight() {
        let switch = Arc::new(CountingSwitch {
            calls: AtomicUsize::new(0),
            delay: Some(Duration::from_millis(100)),
        });
        let (_temp, _registry, tracker) = setup(switch);
        let tracker = Arc::new(tracker);

        let setter = {
            let tracker = Arc::clone(&tracker);
            tokio::spawn(async move { tracker.set(&user("alice"), &name("alpha")).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        // The set is mid-switch; get must observe its result, not the old state
        let seen = tracker.active_name(&user("alice")).await.unwrap();
        assert_eq!(seen, Some(name("alpha")));
        setter.await.unwrap().unwrap();
    }

    /// Removes the project while its working tree is being switched.
    struct DeletingSwitch(ProjectRegistry);

    #[async_trait]
    impl WorkingTreeSwitch for DeletingSwitch {
        async fn switch_to(&self, project: &Project) -> Result<(), ActiveError> {
            self.0.remove(&project.name)?;
            Ok(())
        }
    }

    #[tokio::test]
    async fn project_removed_mid_switch_is_not_recorded() {
        let (_temp, registry, _) = setup(Arc::new(CountingSwitch::default()));
        let tracker = ActiveProjectTracker::new(
            registry.clone(),
            Arc::new(OperationSerializer::new()),
            Arc::new(DeletingSwitch(registry.clone())),
        );

        let result = tracker.set(&user("alice"), &name("alpha")).await;
        assert!(matches!(result, Err(ActiveError::NotFound(_))));
        assert!(registry.store().read_active().unwrap().active.is_empty());
        assert!(tracker.users_of(&name("alpha")).unwrap().is_empty());
    }

    #[tokio::test]
    async fn dangling_pointer_reads_as_none() {
        let (_temp, registry, tracker) = setup(Arc::new(CountingSwitch::default()));
        tracker.set(&user("alice"), &name("alpha")).await.unwrap();

        // Registry-only edit that bypasses pointer cleanup
        registry
            .store()
            .update_registry(|doc| {
                doc.projects.remove(&name("alpha"));
                Ok::<_, StoreError>(())
            })
            .unwrap();

        assert!(tracker.get(&user("alice")).await.unwrap().is_none());
        assert!(tracker.active_name(&user("alice")).await.unwrap().is_none());
    }
}

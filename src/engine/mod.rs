//! engine
//!
//! The project engine: every operation a caller can perform on a project.
//!
//! # Architecture
//!
//! The engine ties the layers together:
//!
//! - [`ProjectRegistry`] knows which projects exist and where they live
//! - [`ActiveProjectTracker`] keeps one active project per user
//! - [`OperationSerializer`] orders operations per project
//! - [`Git`] does the repository work, always on the blocking pool
//! - a [`SecretStore`] holds remote credentials
//!
//! # Operation Lifecycle
//!
//! ```text
//! resolve project -> lock (shared | exclusive) -> open repo -> gate -> act
//! ```
//!
//! Reads take the project's lock shared, anything that changes the
//! repository takes it exclusively. Network operations additionally run
//! under a timeout; on expiry the transfer is cancelled and the operation
//! fails with [`EngineError::Timeout`] once the lock is released.
//!
//! # Invariants
//!
//! - Two mutations of one project never overlap
//! - Every error leaving the engine is an [`EngineError`]
//! - A failed operation leaves the registry unchanged
//!
//! # Example
//!
//! ```ignore
//! use gitdeck::core::config::Config;
//! use gitdeck::core::types::{ProjectName, UserId};
//! use gitdeck::engine::{Engine, ProjectSpec};
//!
//! let engine = Engine::new(Config::load()?)?;
//! let user = UserId::new("alice")?;
//! let demo = ProjectName::new("demo")?;
//! engine.create_project(&user, ProjectSpec::empty(demo.clone())).await?;
//! engine.set_active_project(&user, &demo).await?;
//! ```

mod error;
pub mod gate;
pub mod merge;
mod model;
mod projects;
mod sync;
mod workspace;

pub use error::{EngineError, ErrorKind};
pub use merge::{ConflictResolver, MergeState, Resolution};
pub use model::{
    AuthUpdate, BranchStatus, CommitDetail, CommitPage, CommitQuery, DiffType, ProjectDetails,
    ProjectList, ProjectSource, ProjectSpec, ProjectStatus, ProjectUpdate, PullOptions,
    PullOutcome, PushOptions, PushOutcome, RemoteSpec, RemoteStatus, RemoteUpdate, RemoteView,
    StatusOptions, TreeRef,
};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::core::active::{ActiveProjectTracker, GitCheckout, WorkingTreeSwitch};
use crate::core::config::Config;
use crate::core::ops::OperationSerializer;
use crate::core::paths::DeckPaths;
use crate::core::registry::{Project, ProjectRegistry, RegistryStore};
use crate::core::types::{ProjectName, RemoteName};
use crate::git::{Credentials, Git, Transfer};
use crate::secrets::{create_store, SecretStore};

/// The project engine.
pub struct Engine {
    config: Config,
    paths: DeckPaths,
    registry: ProjectRegistry,
    serializer: Arc<OperationSerializer>,
    tracker: ActiveProjectTracker,
    secrets: Arc<dyn SecretStore>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("workspace", &self.paths.workspace())
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Engine over the configured workspace, secret provider and the
    /// default working-tree switch.
    pub fn new(config: Config) -> Result<Self, EngineError> {
        let paths = DeckPaths::new(config.workspace()?);
        let secrets = create_store(config.secrets_provider(), &paths)?;
        Self::with_components(config, secrets, Arc::new(GitCheckout))
    }

    /// Engine with an explicit secret store and working-tree switch.
    pub fn with_components(
        config: Config,
        secrets: Arc<dyn SecretStore>,
        switch: Arc<dyn WorkingTreeSwitch>,
    ) -> Result<Self, EngineError> {
        let paths = DeckPaths::new(config.workspace()?);
        let registry = ProjectRegistry::new(RegistryStore::new(paths.clone()));
        let serializer = Arc::new(OperationSerializer::new());
        let tracker = ActiveProjectTracker::new(registry.clone(), Arc::clone(&serializer), switch);
        Ok(Self {
            config,
            paths,
            registry,
            serializer,
            tracker,
            secrets,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn paths(&self) -> &DeckPaths {
        &self.paths
    }

    /// The per-project lock table.
    pub fn serializer(&self) -> &Arc<OperationSerializer> {
        &self.serializer
    }

    /// Whether projects can be created and versioned here.
    pub fn available(&self) -> bool {
        match std::fs::create_dir_all(self.paths.projects_dir()) {
            Ok(()) => true,
            Err(e) => {
                warn!(workspace = %self.paths.workspace().display(), error = %e, "workspace unavailable");
                false
            }
        }
    }

    // =========================================================================
    // Execution helpers
    // =========================================================================

    fn identity(&self) -> Option<(String, String)> {
        self.config
            .author()
            .map(|(name, email)| (name.to_string(), email.to_string()))
    }

    /// Run `work` against `name`'s repository holding its lock exclusively.
    async fn exclusive<T, F>(&self, name: &ProjectName, work: F) -> Result<T, EngineError>
    where
        F: FnOnce(&Git, &Project) -> Result<T, EngineError> + Send + 'static,
        T: Send + 'static,
    {
        let project = self.registry.get(name)?;
        let identity = self.identity();
        self.serializer
            .run_exclusive(name, move || {
                let git = open_project(&project, identity)?;
                work(&git, &project)
            })
            .await?
    }

    /// Run `work` against `name`'s repository holding its lock shared.
    async fn shared<T, F>(&self, name: &ProjectName, work: F) -> Result<T, EngineError>
    where
        F: FnOnce(&Git, &Project) -> Result<T, EngineError> + Send + 'static,
        T: Send + 'static,
    {
        let project = self.registry.get(name)?;
        let identity = self.identity();
        self.serializer
            .run_shared(name, move || {
                let git = open_project(&project, identity)?;
                work(&git, &project)
            })
            .await?
    }

    /// Like [`exclusive`](Self::exclusive), bounded by a network timeout.
    async fn network<T, F>(
        &self,
        name: &ProjectName,
        operation: &'static str,
        timeout: Option<Duration>,
        work: F,
    ) -> Result<T, EngineError>
    where
        F: FnOnce(&Git, &Project, &Network) -> Result<T, EngineError> + Send + 'static,
        T: Send + 'static,
    {
        let network = Network {
            cancel: CancellationToken::new(),
            secrets: Arc::clone(&self.secrets),
        };
        let cancel = network.cancel.clone();
        let task = self.exclusive(name, move |git, project| work(git, project, &network));
        let timeout = timeout.unwrap_or_else(|| self.config.network_timeout());
        with_timeout(name, operation, timeout, cancel, task).await
    }
}

/// Cancellation and credential lookup handed to network work.
pub(crate) struct Network {
    cancel: CancellationToken,
    secrets: Arc<dyn SecretStore>,
}

impl Network {
    /// Transfer options for `remote` of `project`, with stored credentials.
    fn transfer(&self, project: &Project, remote: &RemoteName) -> Result<Transfer, EngineError> {
        let credentials = match project.remote(remote).and_then(|r| r.auth.as_deref()) {
            Some(key) => self.secrets.get(key)?.as_deref().and_then(Credentials::parse),
            None => None,
        };
        Ok(Transfer {
            cancel: self.cancel.clone(),
            credentials,
        })
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Await `task`; once `timeout` passes, trip `cancel` and report the
/// operation as timed out if the work noticed.
///
/// The task is always awaited to completion so its lock is released before
/// this returns.
async fn with_timeout<T>(
    name: &ProjectName,
    operation: &'static str,
    timeout: Duration,
    cancel: CancellationToken,
    task: impl Future<Output = Result<T, EngineError>>,
) -> Result<T, EngineError> {
    tokio::pin!(task);
    let result = tokio::select! {
        result = &mut task => result,
        _ = tokio::time::sleep(timeout) => {
            warn!(project = %name, operation, timeout_ms = timeout.as_millis() as u64, "network operation timed out, cancelling");
            cancel.cancel();
            task.await
        }
    };
    match result {
        Err(EngineError::Timeout(_)) => Err(EngineError::Timeout(operation.to_string())),
        other => other,
    }
}

fn open_project(project: &Project, identity: Option<(String, String)>) -> Result<Git, EngineError> {
    if !project.path.is_dir() {
        return Err(EngineError::StorageUnavailable(format!(
            "working tree of project '{}' is missing: {}",
            project.name,
            project.path.display()
        )));
    }
    let git = Git::open(&project.path)?;
    Ok(match identity {
        Some((name, email)) => git.with_identity(name, email),
        None => git,
    })
}

//! core::ops::serializer
//!
//! Per-project mutual exclusion for working-tree operations.
//!
//! # Architecture
//!
//! Each project owns one fair [`tokio::sync::RwLock`]. Mutating operations
//! take it exclusively; read-only operations take it shared so they never
//! observe a half-applied checkout or merge. Tokio's lock queues waiters in
//! arrival order, which gives FIFO admission and rules out writer
//! starvation under sustained contention.
//!
//! Locks are keyed by project, so operations on different projects never
//! contend.
//!
//! # Invariants
//!
//! - At most one exclusive holder per project at any instant
//! - Guards release on drop, including on error and panic paths
//! - Blocking work started by [`OperationSerializer::run_exclusive`] owns its
//!   guard, so the lock is released exactly when the work ends even if the
//!   awaiting caller has gone away
//!
//! # Example
//!
//! ```ignore
//! let serializer = OperationSerializer::new();
//! let oid = serializer
//!     .run_exclusive(&project, move || git.commit("message"))
//!     .await??;
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};
use tokio::task::JoinError;
use tracing::debug;

use crate::core::types::ProjectName;

/// Exclusive hold on a project's working tree.
#[derive(Debug)]
pub struct ExclusiveGuard {
    project: ProjectName,
    _guard: OwnedRwLockWriteGuard<()>,
}

impl ExclusiveGuard {
    /// The project this guard covers.
    pub fn project(&self) -> &ProjectName {
        &self.project
    }
}

impl Drop for ExclusiveGuard {
    fn drop(&mut self) {
        debug!(project = %self.project, "released exclusive project lock");
    }
}

/// Shared hold on a project's working tree.
#[derive(Debug)]
pub struct SharedGuard {
    project: ProjectName,
    _guard: OwnedRwLockReadGuard<()>,
}

impl SharedGuard {
    /// The project this guard covers.
    pub fn project(&self) -> &ProjectName {
        &self.project
    }
}

/// Per-project lock table.
#[derive(Debug, Default)]
pub struct OperationSerializer {
    locks: Mutex<HashMap<ProjectName, Arc<RwLock<()>>>>,
}

impl OperationSerializer {
    /// Create an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the lock for `project`.
    fn lock_for(&self, project: &ProjectName) -> Arc<RwLock<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            locks
                .entry(project.clone())
                .or_insert_with(|| Arc::new(RwLock::new(()))),
        )
    }

    /// Wait for exclusive access to `project`.
    pub async fn exclusive(&self, project: &ProjectName) -> ExclusiveGuard {
        debug!(project = %project, "waiting for exclusive project lock");
        let guard = self.lock_for(project).write_owned().await;
        debug!(project = %project, "acquired exclusive project lock");
        ExclusiveGuard {
            project: project.clone(),
            _guard: guard,
        }
    }

    /// Take exclusive access only if nobody holds or awaits the lock.
    pub fn try_exclusive(&self, project: &ProjectName) -> Option<ExclusiveGuard> {
        let guard = self.lock_for(project).try_write_owned().ok()?;
        Some(ExclusiveGuard {
            project: project.clone(),
            _guard: guard,
        })
    }

    /// Wait for shared access to `project`.
    pub async fn shared(&self, project: &ProjectName) -> SharedGuard {
        let guard = self.lock_for(project).read_owned().await;
        SharedGuard {
            project: project.clone(),
            _guard: guard,
        }
    }

    /// Whether any operation currently holds `project`'s lock.
    pub fn is_busy(&self, project: &ProjectName) -> bool {
        let locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        match locks.get(project) {
            Some(lock) => lock.try_write().is_err(),
            None => false,
        }
    }

    /// Run an async operation while holding `project` exclusively.
    pub async fn with_lock<F, Fut, T>(&self, project: &ProjectName, operation: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _guard = self.exclusive(project).await;
        operation().await
    }

    /// Run blocking work on the blocking pool while holding `project`
    /// exclusively.
    ///
    /// The guard moves into the blocking task, so the lock is released when
    /// the work finishes, never earlier.
    pub async fn run_exclusive<F, T>(&self, project: &ProjectName, work: F) -> Result<T, JoinError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let guard = self.exclusive(project).await;
        tokio::task::spawn_blocking(move || {
            let _guard = guard;
            work()
        })
        .await
    }

    /// Run blocking work while holding `project` shared.
    pub async fn run_shared<F, T>(&self, project: &ProjectName, work: F) -> Result<T, JoinError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let guard = self.shared(project).await;
        tokio::task::spawn_blocking(move || {
            let _guard = guard;
            work()
        })
        .await
    }

    /// Drop the lock entry for a deleted project.
    ///
    /// Holders of an existing guard keep their `Arc`, so this never
    /// releases a lock early.
    pub fn forget(&self, project: &ProjectName) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.remove(project);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn project(name: &str) -> ProjectName {
        ProjectName::new(name).unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn at_most_one_exclusive_holder() {
        let serializer = Arc::new(OperationSerializer::new());
        let active = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let demo = project("demo");

        let mut handles = Vec::new();
        for _ in 0..16 {
            let serializer = Arc::clone(&serializer);
            let active = Arc::clone(&active);
            let max_seen = Arc::clone(&max_seen);
            let demo = demo.clone();
            handles.push(tokio::spawn(async move {
                serializer
                    .with_lock(&demo, || async {
                        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                        max_seen.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        active.fetch_sub(1, Ordering::SeqCst);
                    })
                    .await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn waiters_admitted_in_arrival_order() {
        let serializer = Arc::new(OperationSerializer::new());
        let demo = project("demo");
        let order = Arc::new(Mutex::new(Vec::new()));

        let held = serializer.exclusive(&demo).await;

        let mut handles = Vec::new();
        for i in 0..3 {
            let serializer = Arc::clone(&serializer);
            let order = Arc::clone(&order);
            let demo = demo.clone();
            handles.push(tokio::spawn(async move {
                let _guard = serializer.exclusive(&demo).await;
                order.lock().unwrap().push(i);
            }));
            // Let the task enqueue before spawning the next one
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        drop(held);
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn different_projects_do_not_contend() {
        let serializer = OperationSerializer::new();
        let _a = serializer.exclusive(&project("a")).await;
        let b = serializer.try_exclusive(&project("b"));
        assert!(b.is_some());
    }

    #[tokio::test]
    async fn busy_reflects_holders() {
        let serializer = OperationSerializer::new();
        let demo = project("demo");
        assert!(!serializer.is_busy(&demo));

        let guard = serializer.exclusive(&demo).await;
        assert!(serializer.is_busy(&demo));
        assert_eq!(guard.project(), &demo);

        drop(guard);
        assert!(!serializer.is_busy(&demo));
    }

    #[tokio::test]
    async fn shared_holders_coexist_but_block_writers() {
        let serializer = OperationSerializer::new();
        let demo = project("demo");

        let r1 = serializer.shared(&demo).await;
        let r2 = serializer.shared(&demo).await;
        assert!(serializer.try_exclusive(&demo).is_none());

        drop(r1);
        drop(r2);
        assert!(serializer.try_exclusive(&demo).is_some());
    }

    #[tokio::test]
    async fn lock_released_after_error() {
        let serializer = OperationSerializer::new();
        let demo = project("demo");

        let result: Result<(), &str> = serializer
            .with_lock(&demo, || async { Err("boom") })
            .await;
        assert!(result.is_err());
        assert!(!serializer.is_busy(&demo));
    }

    #[tokio::test]
    async fn lock_released_after_panic_in_blocking_work() {
        let serializer = OperationSerializer::new();
        let demo = project("demo");

        let result = serializer
            .run_exclusive(&demo, || -> () { panic!("work failed") })
            .await;
        assert!(result.is_err());
        assert!(!serializer.is_busy(&demo));
    }

    #[tokio::test]
    async fn run_exclusive_returns_value() {
        let serializer = OperationSerializer::new();
        let value = serializer
            .run_exclusive(&project("demo"), || 41 + 1)
            .await
            .unwrap();
        assert_eq!(value, 42);
    }
}

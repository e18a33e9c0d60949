//! # Task Supervisor
//!
//! Owns every background task spawned by the bus (fire-and-forget async
//! handlers) or by long-running services (periodic loops). Shutdown aborts
//! the tasks and awaits them, so nothing outlives its owner.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Holder of spawned task handles.
pub struct TaskSupervisor {
    name: &'static str,
    tasks: Mutex<JoinSet<()>>,
    spawned: AtomicU64,
}

impl TaskSupervisor {
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            tasks: Mutex::new(JoinSet::new()),
            spawned: AtomicU64::new(0),
        }
    }

    /// Spawn a task on the current tokio runtime.
    ///
    /// Returns false, without running the future, when called outside a
    /// runtime.
    pub fn spawn<F>(&self, task: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Ok(handle) = Handle::try_current() else {
            warn!(supervisor = self.name, "No tokio runtime; task not spawned");
            return false;
        };

        let mut tasks = self.tasks.lock();
        // Reap finished tasks so the set does not grow without bound.
        while let Some(result) = tasks.try_join_next() {
            if let Err(e) = result {
                if e.is_panic() {
                    warn!(supervisor = self.name, "Supervised task panicked");
                }
            }
        }
        tasks.spawn_on(task, &handle);
        self.spawned.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Tasks not yet reaped (running or finished since the last reap).
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Total tasks ever spawned.
    #[must_use]
    pub fn spawned(&self) -> u64 {
        self.spawned.load(Ordering::Relaxed)
    }

    /// Wait for every tracked task to finish on its own.
    pub async fn drain(&self) {
        let mut tasks = std::mem::replace(&mut *self.tasks.lock(), JoinSet::new());
        while tasks.join_next().await.is_some() {}
    }

    /// Abort every tracked task and wait until all have stopped.
    pub async fn shutdown(&self) {
        let mut tasks = std::mem::replace(&mut *self.tasks.lock(), JoinSet::new());
        let count = tasks.len();
        tasks.abort_all();
        while tasks.join_next().await.is_some() {}
        debug!(supervisor = self.name, count, "Supervised tasks stopped");
    }
}

//! Running-task table — the single source of truth for "is this job
//! currently executing".
//!
//! Every operation is compound under one lock acquisition. Callers never get
//! a raw get/set pair, which is what closes the check-then-act race between
//! two dispatches for the same job id.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::executor::task::Task;

/// Concurrent map of in-flight tasks keyed by job id.
pub struct RunningTasks {
    tasks: RwLock<HashMap<i64, Arc<Task>>>,
}

impl RunningTasks {
    pub fn new() -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
        }
    }

    /// Atomically insert `task` if its job id slot is free.
    ///
    /// On conflict returns the current occupant, untouched.
    pub async fn try_insert(&self, task: Arc<Task>) -> Result<(), Arc<Task>> {
        use std::collections::hash_map::Entry;

        let mut tasks = self.tasks.write().await;
        match tasks.entry(task.job_id) {
            Entry::Occupied(entry) => Err(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                entry.insert(task);
                Ok(())
            }
        }
    }

    /// Look up the in-flight task for `job_id`.
    pub async fn get(&self, job_id: i64) -> Option<Arc<Task>> {
        self.tasks.read().await.get(&job_id).cloned()
    }

    /// Unconditionally remove and return the task for `job_id` (kill path).
    pub async fn remove(&self, job_id: i64) -> Option<Arc<Task>> {
        self.tasks.write().await.remove(&job_id)
    }

    /// Remove the entry for `task`'s job id only if the occupant is the same
    /// run. A finished task that was already superseded via COVER_EARLY must
    /// not delete its replacement.
    pub async fn remove_if_match(&self, task: &Task) -> bool {
        let mut tasks = self.tasks.write().await;
        match tasks.get(&task.job_id) {
            Some(current) if current.run_id == task.run_id => {
                tasks.remove(&task.job_id);
                true
            }
            _ => false,
        }
    }

    /// COVER_EARLY override: if the occupant of `expected`'s slot is still
    /// `expected`, cancel it and swap in `new` as one transition — there is
    /// no window where the slot is empty or holds both.
    ///
    /// Returns false (and leaves the table alone) if the occupant changed or
    /// vanished since the caller observed it.
    pub async fn replace_if_match(&self, expected: &Task, new: Arc<Task>) -> bool {
        let mut tasks = self.tasks.write().await;
        match tasks.get(&expected.job_id) {
            Some(current) if current.run_id == expected.run_id => {
                let old = tasks.insert(expected.job_id, new);
                if let Some(old) = old {
                    old.cancel();
                }
                true
            }
            _ => false,
        }
    }

    /// Number of in-flight tasks.
    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }

    /// Job ids currently in flight, for diagnostics.
    pub async fn job_ids(&self) -> Vec<i64> {
        self.tasks.read().await.keys().copied().collect()
    }
}

impl Default for RunningTasks {
    fn default() -> Self {
        Self::new()
    }
}

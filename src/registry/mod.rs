/*!
 * Process Registry
 * Table of running jobs, consulted for mass termination
 */

mod control;

pub use control::JobControl;

use crate::core::JobId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

struct Inner {
    jobs: Mutex<HashMap<JobId, Arc<JobControl>>>,
    next_id: AtomicU64,
}

/// Shared handle to the table of running jobs
///
/// Cloning is cheap; all clones see the same table.
#[derive(Clone)]
pub struct ProcessRegistry {
    inner: Arc<Inner>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                jobs: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Allocate a control block with a fresh job id
    pub(crate) fn control(&self, key: String, group: bool) -> Arc<JobControl> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        Arc::new(JobControl::new(id, key, group))
    }

    pub fn register(&self, control: Arc<JobControl>) {
        self.inner.jobs.lock().insert(control.id(), control);
    }

    /// Remove a job; returns its control block if it was still present
    pub fn deregister(&self, id: JobId) -> Option<Arc<JobControl>> {
        self.inner.jobs.lock().remove(&id)
    }

    /// Interrupt every registered job
    ///
    /// Entries are removed under the lock and signalled after it is released.
    /// Returns the number of jobs interrupted.
    pub fn terminate_all(&self) -> usize {
        let snapshot: Vec<Arc<JobControl>> = {
            let mut jobs = self.inner.jobs.lock();
            jobs.drain().map(|(_, control)| control).collect()
        };
        Self::interrupt(&snapshot, "all")
    }

    /// Interrupt every registered job whose key equals `key`
    pub fn terminate(&self, key: &str) -> usize {
        let snapshot: Vec<Arc<JobControl>> = {
            let mut jobs = self.inner.jobs.lock();
            let ids: Vec<JobId> = jobs
                .values()
                .filter(|control| control.key() == key)
                .map(|control| control.id())
                .collect();
            ids.iter().filter_map(|id| jobs.remove(id)).collect()
        };
        Self::interrupt(&snapshot, key)
    }

    fn interrupt(snapshot: &[Arc<JobControl>], scope: &str) -> usize {
        for control in snapshot {
            if let Err(e) = control.request_interrupt() {
                warn!(job_id = control.id(), key = control.key(), error = %e, "Failed to signal job");
            }
        }
        if !snapshot.is_empty() {
            info!(count = snapshot.len(), scope, "Terminating registered jobs");
        }
        snapshot.len()
    }

    pub fn len(&self) -> usize {
        self.inner.jobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.jobs.lock().is_empty()
    }

    pub fn contains(&self, id: JobId) -> bool {
        self.inner.jobs.lock().contains_key(&id)
    }

    /// Keys of the registered jobs, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .inner
            .jobs
            .lock()
            .values()
            .map(|control| control.key().to_string())
            .collect();
        keys.sort();
        keys
    }
}

impl Default for ProcessRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProcessRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessRegistry")
            .field("jobs", &self.len())
            .finish()
    }
}

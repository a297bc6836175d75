/*!
 * Job Control Block
 *
 * The handle the registry keeps for a live job. It never owns the child
 * process; it only knows the OS pid while the pid is guaranteed to belong to
 * the job's child. The owning job reaps under the same lock and clears the
 * pid, so a signal can never hit a recycled pid.
 */

use crate::core::{ExecResult, JobId, OsPid};
use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use parking_lot::Mutex;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

#[derive(Debug)]
pub struct JobControl {
    id: JobId,
    key: String,
    pid: Mutex<Option<OsPid>>,
    group: bool,
    interrupted: AtomicBool,
}

impl JobControl {
    pub(crate) fn new(id: JobId, key: String, group: bool) -> Self {
        Self {
            id,
            key,
            pid: Mutex::new(None),
            group,
            interrupted: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// OS pid of the child, while it has not been reaped
    pub fn pid(&self) -> Option<OsPid> {
        *self.pid.lock()
    }

    pub(crate) fn attach(&self, pid: OsPid) {
        *self.pid.lock() = Some(pid);
    }

    /// Forget the pid before a blocking wait
    pub(crate) fn detach(&self) -> Option<OsPid> {
        self.pid.lock().take()
    }

    /// Run a non-blocking wait while holding the pid lock
    ///
    /// The pid is cleared as soon as the wait reports an exit status.
    pub(crate) fn reap<T>(
        &self,
        try_wait: impl FnOnce() -> io::Result<Option<T>>,
    ) -> io::Result<Option<T>> {
        let mut pid = self.pid.lock();
        let status = try_wait()?;
        if status.is_some() {
            *pid = None;
        }
        Ok(status)
    }

    /// Send `signal` to the child (or its process group)
    ///
    /// Returns `Ok(false)` when there is nothing left to signal.
    pub fn signal(&self, signal: Signal) -> ExecResult<bool> {
        let pid = self.pid.lock();
        let Some(pid) = *pid else {
            return Ok(false);
        };

        let target = if self.group {
            Pid::from_raw(-pid)
        } else {
            Pid::from_raw(pid)
        };
        match kill(target, signal) {
            Ok(()) => {
                debug!(job_id = self.id, pid, signal = signal.as_str(), group = self.group, "Signal sent");
                Ok(true)
            }
            Err(Errno::ESRCH) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Flag the job as externally interrupted and ask the child to stop
    ///
    /// The owning job notices the flag on its next tick and escalates.
    pub fn request_interrupt(&self) -> ExecResult<bool> {
        self.interrupted.store(true, Ordering::SeqCst);
        self.signal(Signal::SIGTERM)
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }
}

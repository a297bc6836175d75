/*!
 * Interrupt Controller
 *
 * Routes SIGINT to `ProcessRegistry::terminate_all`. The handler itself only
 * sets a flag; a supervisor thread polls the flag and does the termination
 * outside signal context.
 */

use super::delivery;
use crate::core::limits::INTERRUPT_POLL_INTERVAL;
use crate::core::{ExecError, ExecResult};
use crate::registry::ProcessRegistry;
use flume::{Receiver, RecvTimeoutError, Sender};
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use parking_lot::Mutex;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

struct Installed {
    previous: SigAction,
    stop: Sender<()>,
    supervisor: JoinHandle<()>,
}

/// The one active installation; signal dispositions are process-wide
static SLOT: Mutex<Option<Installed>> = parking_lot::const_mutex(None);

/// Process-wide SIGINT handling for running jobs
pub struct InterruptController;

impl InterruptController {
    /// Install the handler for `registry`
    ///
    /// Returns `Ok(false)` without changing anything if a handler is already
    /// installed.
    pub fn install(registry: &ProcessRegistry) -> ExecResult<bool> {
        Self::install_with(registry, INTERRUPT_POLL_INTERVAL)
    }

    pub fn install_with(registry: &ProcessRegistry, poll: Duration) -> ExecResult<bool> {
        if poll.is_zero() {
            return Err(ExecError::InvalidConfig(
                "interrupt poll interval must be positive".to_string(),
            ));
        }

        let mut slot = SLOT.lock();
        if slot.is_some() {
            info!("Interrupt controller already installed, ignoring");
            return Ok(false);
        }

        delivery::clear_pending();
        let (stop, stopped) = flume::bounded(1);
        let watched = registry.clone();
        let supervisor = thread::Builder::new()
            .name("cmdjob-interrupt".to_string())
            .spawn(move || supervise(watched, stopped, poll))
            .map_err(|e| ExecError::io("spawning interrupt supervisor", e))?;

        let action = SigAction::new(
            SigHandler::Handler(delivery::on_interrupt),
            SaFlags::SA_RESTART,
            SigSet::empty(),
        );
        // SAFETY: the handler only stores to an atomic
        let previous = match unsafe { sigaction(Signal::SIGINT, &action) } {
            Ok(previous) => previous,
            Err(e) => {
                let _ = stop.send(());
                let _ = supervisor.join();
                return Err(e.into());
            }
        };

        *slot = Some(Installed {
            previous,
            stop,
            supervisor,
        });
        info!(poll = ?poll, "Interrupt controller installed");
        Ok(true)
    }

    /// Restore the previous SIGINT disposition and stop the supervisor
    ///
    /// Returns `Ok(false)` if nothing was installed.
    pub fn remove() -> ExecResult<bool> {
        let mut slot = SLOT.lock();
        let Some(installed) = slot.take() else {
            return Ok(false);
        };

        // SAFETY: restores a disposition previously returned by sigaction
        let restored = unsafe { sigaction(Signal::SIGINT, &installed.previous) };

        let _ = installed.stop.send(());
        if installed.supervisor.join().is_err() {
            warn!("Interrupt supervisor panicked");
        }
        restored?;
        info!("Interrupt controller removed");
        Ok(true)
    }

    pub fn is_installed() -> bool {
        SLOT.lock().is_some()
    }

    /// Act as if SIGINT had been delivered
    pub fn trigger() {
        delivery::mark_pending();
    }

    /// Interrupts handled since process start
    pub fn observed() -> u64 {
        delivery::observed()
    }
}

fn supervise(registry: ProcessRegistry, stop: Receiver<()>, poll: Duration) {
    debug!("Interrupt supervisor started");
    loop {
        let stopping = match stop.recv_timeout(poll) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
            Err(RecvTimeoutError::Timeout) => false,
        };
        if delivery::take_pending() {
            let count = registry.terminate_all();
            warn!(count, "Interrupt received, terminating running jobs");
        }
        if stopping {
            break;
        }
    }
    debug!("Interrupt supervisor stopped");
}

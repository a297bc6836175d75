/*!
 * Timeout Supervisor
 *
 * Wait-loop policy for a running job. After every I/O pass the job asks the
 * supervisor what to do next; the supervisor also sizes the next readiness
 * wait so a deadline is never overshot by more than one tick.
 */

use std::time::{Duration, Instant};

/// Decision taken at the end of one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickVerdict {
    /// Keep waiting
    Continue,
    /// Quit predicate asked to stop
    Quit,
    /// Registry requested termination
    Interrupted,
    /// Process exited on its own
    Exited,
    /// Deadline passed
    DeadlineExceeded,
}

/// Observations gathered during one tick
#[derive(Debug, Clone, Copy, Default)]
pub struct TickState {
    pub quit_requested: bool,
    pub interrupted: bool,
    pub exited: bool,
}

/// Deadline and tick bookkeeping for one job
#[derive(Debug, Clone, Copy)]
pub struct TimeoutSupervisor {
    tick: Duration,
    started: Instant,
    deadline: Option<Instant>,
    ticks: u64,
}

impl TimeoutSupervisor {
    pub fn new(tick: Duration, started: Instant, timeout: Option<Duration>) -> Self {
        Self {
            tick,
            started,
            deadline: timeout.map(|t| started + t),
            ticks: 0,
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn started(&self) -> Instant {
        self.started
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Longest the next readiness wait may block
    pub fn wait_budget(&self, now: Instant) -> Duration {
        match self.deadline {
            Some(deadline) => self.tick.min(deadline.saturating_duration_since(now)),
            None => self.tick,
        }
    }

    pub fn expired(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }

    /// Apply the per-tick order: quit, interrupt, exit, deadline
    pub fn evaluate(&mut self, state: TickState, now: Instant) -> TickVerdict {
        self.ticks += 1;
        if state.quit_requested {
            TickVerdict::Quit
        } else if state.interrupted {
            TickVerdict::Interrupted
        } else if state.exited {
            TickVerdict::Exited
        } else if self.expired(now) {
            TickVerdict::DeadlineExceeded
        } else {
            TickVerdict::Continue
        }
    }
}

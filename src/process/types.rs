/*!
 * Process Types
 * Result record and outcome of one command execution
 */

use crate::core::limits::SIGNAL_EXIT_BASE;
use crate::core::serde::{duration_secs, is_empty_vec, is_false, is_none, lossy_utf8};
use crate::core::{ExecError, ExecResult};
use serde::{Deserialize, Serialize};
use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;
use std::time::{Duration, SystemTime};

/// How a job reached its terminal state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Process exited on its own
    Completed,
    /// Deadline passed, process was terminated
    TimedOut,
    /// Terminated through the registry (interrupt controller or caller)
    Interrupted,
    /// Quit predicate asked the job to stop
    Cancelled,
    /// Dry run, nothing was spawned
    DryRun,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Completed => "completed",
            Outcome::TimedOut => "timed_out",
            Outcome::Interrupted => "interrupted",
            Outcome::Cancelled => "cancelled",
            Outcome::DryRun => "dry_run",
        }
    }

    /// Whether the engine ended the process rather than the process itself
    pub fn is_forced(&self) -> bool {
        matches!(
            self,
            Outcome::TimedOut | Outcome::Interrupted | Outcome::Cancelled
        )
    }
}

/// Decoded wait status of a finished process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitInfo {
    /// Exit code, or 128 + signal for signal deaths
    pub status: i32,
    /// Terminating signal, if any
    pub signal: Option<i32>,
}

impl From<ExitStatus> for ExitInfo {
    fn from(status: ExitStatus) -> Self {
        match (status.code(), status.signal()) {
            (Some(code), _) => ExitInfo {
                status: code,
                signal: None,
            },
            (None, Some(sig)) => ExitInfo {
                status: SIGNAL_EXIT_BASE + sig,
                signal: Some(sig),
            },
            // Stopped/continued statuses never reach us from wait(); keep a sentinel
            (None, None) => ExitInfo {
                status: -1,
                signal: None,
            },
        }
    }
}

/// Outcome of one command execution
///
/// Produced once by [`crate::ProcessJob::finalize`] and never mutated after.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct CommandResult {
    pub command: String,
    pub key: String,
    #[serde(serialize_with = "lossy_utf8::serialize")]
    pub stdout: Vec<u8>,
    #[serde(serialize_with = "lossy_utf8::serialize")]
    pub stderr: Vec<u8>,
    pub exit_status: Option<i32>,
    #[serde(skip_serializing_if = "is_none")]
    pub signal: Option<i32>,
    #[serde(serialize_with = "duration_secs::serialize")]
    pub duration: Duration,
    pub timed_out: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub killed: bool,
    pub outcome: Outcome,
    #[serde(
        skip_serializing_if = "is_none",
        serialize_with = "crate::core::serde::optional_system_time_micros::serialize"
    )]
    pub started_at: Option<SystemTime>,
    #[serde(skip_serializing_if = "is_empty_vec")]
    pub stream_errors: Vec<String>,
}

impl CommandResult {
    /// Synthetic result for a command that was only logged
    pub(crate) fn dry_run(command: String, key: String) -> Self {
        Self {
            command,
            key,
            stdout: Vec::new(),
            stderr: Vec::new(),
            exit_status: Some(0),
            signal: None,
            duration: Duration::ZERO,
            timed_out: false,
            killed: false,
            outcome: Outcome::DryRun,
            started_at: None,
            stream_errors: Vec::new(),
        }
    }

    /// Process completed on its own with status 0
    pub fn success(&self) -> bool {
        matches!(self.outcome, Outcome::Completed | Outcome::DryRun) && self.exit_status == Some(0)
    }

    pub fn stdout_str(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_str(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration.as_secs_f64()
    }

    /// Convert a non-successful result into an error carrying stderr
    pub fn check(self) -> ExecResult<Self> {
        match self.outcome {
            Outcome::TimedOut => Err(ExecError::TimedOut {
                command: self.command,
                after: self.duration,
            }),
            Outcome::Interrupted => Err(ExecError::Interrupted {
                command: self.command,
            }),
            Outcome::Cancelled => Err(ExecError::Cancelled {
                command: self.command,
            }),
            Outcome::Completed | Outcome::DryRun => match self.exit_status {
                Some(0) => Ok(self),
                status => Err(ExecError::NonZeroExit {
                    stderr: self.stderr_str(),
                    command: self.command,
                    status: status.unwrap_or(-1),
                }),
            },
        }
    }
}

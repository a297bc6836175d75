/*!
 * Error Types
 * Centralized error handling with thiserror and miette
 */

use miette::Diagnostic;
use std::time::Duration;
use thiserror::Error;

/// Result type for engine operations
pub type ExecResult<T> = Result<T, ExecError>;

/// Errors surfaced by command execution
///
/// Nonzero exits, timeouts and interrupts are normally returned as data inside
/// [`crate::CommandResult`]; the corresponding variants here are only produced
/// when a caller opts in through [`crate::CommandResult::check`].
#[derive(Error, Debug, Diagnostic)]
pub enum ExecError {
    #[error("Failed to launch '{command}': {source}")]
    #[diagnostic(
        code(exec::launch_failed),
        help("Check that the program (or the configured shell) exists and is executable.")
    )]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    #[diagnostic(
        code(exec::invalid_config),
        help("Timeouts and tick intervals must be positive; commands must not be empty.")
    )]
    InvalidConfig(String),

    #[error("Job already started: {0}")]
    #[diagnostic(
        code(exec::already_started),
        help("A job can only be started once. Build a new job to run the command again.")
    )]
    AlreadyStarted(String),

    #[error("Job not started: {0}")]
    #[diagnostic(code(exec::not_started))]
    NotStarted(String),

    #[error("Job already finalized: {0}")]
    #[diagnostic(code(exec::already_finalized))]
    AlreadyFinalized(String),

    #[error("Process still running: {0}")]
    #[diagnostic(
        code(exec::still_running),
        help("Call terminate() or wait for the process to exit before finalizing.")
    )]
    StillRunning(String),

    #[error("I/O error while {context}: {source}")]
    #[diagnostic(code(exec::io))]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Signal delivery failed: {0}")]
    #[diagnostic(code(exec::signal))]
    Signal(#[from] nix::errno::Errno),

    #[error("Command '{command}' exited with status {status}: {stderr}")]
    #[diagnostic(code(exec::nonzero_exit))]
    NonZeroExit {
        command: String,
        status: i32,
        stderr: String,
    },

    #[error("Command '{command}' timed out after {after:?}")]
    #[diagnostic(
        code(exec::timed_out),
        help("Increase the timeout or check why the command hangs.")
    )]
    TimedOut { command: String, after: Duration },

    #[error("Command '{command}' was interrupted")]
    #[diagnostic(code(exec::interrupted))]
    Interrupted { command: String },

    #[error("Command '{command}' was cancelled by its quit predicate")]
    #[diagnostic(code(exec::cancelled))]
    Cancelled { command: String },
}

impl ExecError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        ExecError::Io {
            context: context.into(),
            source,
        }
    }

    /// Whether the error was raised before any process existed
    pub fn is_launch_failure(&self) -> bool {
        matches!(self, ExecError::Launch { .. })
    }
}

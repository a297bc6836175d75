/*!
 * cmdjob
 *
 * Runs external commands with concurrent, non-blocking output capture,
 * optional deadlines and signal-driven mass cancellation.
 */

pub mod core;
pub mod monitoring;
pub mod process;
pub mod registry;
pub mod signals;

// Re-exports
pub use crate::core::{ExecError, ExecResult, JobId, OsPid, Stream};
pub use monitoring::{init_tracing, ReportFormat, ResultReporter};
pub use process::{
    CommandResult, CommandRunner, CommandSpec, ExecConfig, Executor, JobBuilder, Outcome,
    ProcessJob, QuitPredicate, RunOptions, SharedBuffer, TeeSink,
};
pub use registry::{JobControl, ProcessRegistry};
pub use signals::InterruptController;

/*!
 * Process Module
 * Launching, multiplexing, supervising and finalizing external commands
 */

pub mod command;
pub mod config;
pub mod job;
pub mod multiplexer;
pub mod runner;
pub mod sink;
pub mod stdin;
pub mod supervisor;
pub mod types;

// Re-export for convenience
pub use command::CommandSpec;
pub use config::ExecConfig;
pub use job::{JobBuilder, ProcessJob};
pub use multiplexer::{CapturedOutput, Endpoints, OutputMultiplexer};
pub use runner::{CommandRunner, Executor, RunOptions};
pub use sink::{QuitPredicate, SharedBuffer, TeeSink};
pub use stdin::StdinFeeder;
pub use supervisor::{TickState, TickVerdict, TimeoutSupervisor};
pub use types::{CommandResult, ExitInfo, Outcome};

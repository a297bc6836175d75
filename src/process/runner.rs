/*!
 * Executor
 *
 * Context object bundling configuration, registry and reporter. `run` is the
 * primary entry point; `spawn` runs the same job on its own thread.
 */

use super::command::CommandSpec;
use super::config::ExecConfig;
use super::job::{JobBuilder, ProcessJob};
use super::sink::{QuitPredicate, TeeSink};
use super::types::CommandResult;
use crate::core::{ExecError, ExecResult, Stream};
use crate::monitoring::ResultReporter;
use crate::registry::ProcessRegistry;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::debug;

/// Per-call options for [`Executor::run`]
#[derive(Default)]
pub struct RunOptions {
    timeout: Option<Duration>,
    stdin: Option<Vec<u8>>,
    stdout_tee: Option<Box<dyn TeeSink>>,
    stderr_tee: Option<Box<dyn TeeSink>>,
    quit: Option<Box<dyn QuitPredicate>>,
    key: Option<String>,
    silent: bool,
    flush_tee: bool,
    discard_stdout: bool,
    discard_stderr: bool,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_stdin(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(payload.into());
        self
    }

    pub fn with_stdout_tee(mut self, sink: impl TeeSink + 'static) -> Self {
        self.stdout_tee = Some(Box::new(sink));
        self
    }

    pub fn with_stderr_tee(mut self, sink: impl TeeSink + 'static) -> Self {
        self.stderr_tee = Some(Box::new(sink));
        self
    }

    pub fn with_quit(mut self, predicate: impl QuitPredicate + 'static) -> Self {
        self.quit = Some(Box::new(predicate));
        self
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }

    pub fn with_flush_tee(mut self) -> Self {
        self.flush_tee = true;
        self
    }

    /// Keep stdout out of memory; a tee still sees it
    pub fn discard_stdout(mut self) -> Self {
        self.discard_stdout = true;
        self
    }

    pub fn discard_stderr(mut self) -> Self {
        self.discard_stderr = true;
        self
    }

    fn apply(self, mut builder: JobBuilder) -> JobBuilder {
        builder = builder
            .maybe_timeout(self.timeout)
            .silent(self.silent)
            .flush_tee(self.flush_tee)
            .capture_stdout(!self.discard_stdout)
            .capture_stderr(!self.discard_stderr);
        if let Some(payload) = self.stdin {
            builder = builder.stdin(payload);
        }
        if let Some(sink) = self.stdout_tee {
            builder = builder.boxed_tee(Stream::Stdout, sink);
        }
        if let Some(sink) = self.stderr_tee {
            builder = builder.boxed_tee(Stream::Stderr, sink);
        }
        if let Some(quit) = self.quit {
            builder = builder.boxed_quit(quit);
        }
        if let Some(key) = self.key {
            builder = builder.key(key);
        }
        builder
    }
}

/// Runs commands against one configuration and one registry
#[derive(Clone, Debug)]
pub struct Executor {
    config: Arc<ExecConfig>,
    registry: ProcessRegistry,
    reporter: Option<ResultReporter>,
}

impl Executor {
    pub fn new(config: ExecConfig) -> ExecResult<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            registry: ProcessRegistry::new(),
            reporter: None,
        })
    }

    /// Share an existing registry (for example one watched by an interrupt controller)
    pub fn with_registry(mut self, registry: ProcessRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_reporter(mut self, reporter: ResultReporter) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn config(&self) -> &ExecConfig {
        &self.config
    }

    pub fn registry(&self) -> &ProcessRegistry {
        &self.registry
    }

    /// Builder preloaded with this executor's config, registry and reporter
    pub fn job(&self, command: impl Into<CommandSpec>) -> JobBuilder {
        let builder = ProcessJob::builder(command)
            .config(Arc::clone(&self.config))
            .registry(self.registry.clone());
        match self.reporter.clone() {
            Some(reporter) => builder.reporter(reporter),
            None => builder,
        }
    }

    /// Run a command to completion on the calling thread
    pub fn run(&self, command: impl Into<CommandSpec>, opts: RunOptions) -> ExecResult<CommandResult> {
        opts.apply(self.job(command)).build()?.run()
    }

    /// Run a command on a dedicated thread
    ///
    /// Configuration errors are returned here, before any thread exists.
    pub fn spawn(
        &self,
        command: impl Into<CommandSpec>,
        opts: RunOptions,
    ) -> ExecResult<JoinHandle<ExecResult<CommandResult>>> {
        let job = opts.apply(self.job(command)).build()?;
        let name = format!("cmdjob-{}", job.id());
        debug!(thread = %name, key = job.key(), "Spawning job thread");
        thread::Builder::new()
            .name(name)
            .spawn(move || job.run())
            .map_err(|e| ExecError::io("spawning job thread", e))
    }

    /// Interrupt every job started through this executor's registry
    pub fn terminate_all(&self) -> usize {
        self.registry.terminate_all()
    }
}

/// Shared contract for anything that runs a command and hands back a result
pub trait CommandRunner: Send + Sync {
    fn run_command(&self, command: &str, timeout: Option<Duration>) -> ExecResult<CommandResult>;
}

impl CommandRunner for Executor {
    fn run_command(&self, command: &str, timeout: Option<Duration>) -> ExecResult<CommandResult> {
        let opts = match timeout {
            Some(timeout) => RunOptions::new().with_timeout(timeout),
            None => RunOptions::new(),
        };
        self.run(command, opts)
    }
}

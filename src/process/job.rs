/*!
 * Process Job
 *
 * Owns one external process from spawn to result: stdin feeding, output
 * multiplexing, deadline enforcement, termination escalation and result
 * assembly. A job runs at most once.
 */

use super::command::CommandSpec;
use super::config::ExecConfig;
use super::multiplexer::{Endpoints, OutputMultiplexer};
use super::sink::{QuitPredicate, TeeSink};
use super::stdin::StdinFeeder;
use super::supervisor::{TickState, TickVerdict, TimeoutSupervisor};
use super::types::{CommandResult, ExitInfo, Outcome};
use crate::core::limits::EXIT_POLL_INTERVAL;
use crate::core::{ExecError, ExecResult, JobId, OsPid, Stream};
use crate::monitoring::{generate_trace_id, job_span, ResultReporter};
use crate::registry::{JobControl, ProcessRegistry};
use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::sys::signal::Signal;
use std::os::fd::AsRawFd;
use std::process::{Child, ChildStderr, ChildStdout, ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, error, info, warn, Span};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobState {
    Created,
    Running,
    Finalized,
}

/// Handles owned while the child is alive
struct Running {
    child: Child,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
    stdin: Option<StdinFeeder>,
}

impl Running {
    fn endpoints(&mut self) -> Endpoints<'_> {
        Endpoints {
            stdout: self.stdout.as_mut(),
            stderr: self.stderr.as_mut(),
            stdin: self.stdin.as_mut(),
        }
    }
}

/// Builder for [`ProcessJob`]
pub struct JobBuilder {
    command: CommandSpec,
    config: Arc<ExecConfig>,
    timeout: Option<Duration>,
    stdin: Option<Vec<u8>>,
    stdout_tee: Option<Box<dyn TeeSink>>,
    stderr_tee: Option<Box<dyn TeeSink>>,
    quit: Option<Box<dyn QuitPredicate>>,
    key: Option<String>,
    registry: Option<ProcessRegistry>,
    reporter: Option<ResultReporter>,
    capture_stdout: bool,
    capture_stderr: bool,
    flush_tee: bool,
    silent: bool,
    dry_run: Option<bool>,
    rejected: Option<String>,
}

impl JobBuilder {
    pub fn new(command: impl Into<CommandSpec>) -> Self {
        Self {
            command: command.into(),
            config: Arc::new(ExecConfig::default()),
            timeout: None,
            stdin: None,
            stdout_tee: None,
            stderr_tee: None,
            quit: None,
            key: None,
            registry: None,
            reporter: None,
            capture_stdout: true,
            capture_stderr: true,
            flush_tee: false,
            silent: false,
            dry_run: None,
            rejected: None,
        }
    }

    pub fn config(mut self, config: Arc<ExecConfig>) -> Self {
        self.config = config;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn maybe_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Timeout in (fractional) seconds; negative or non-finite values are rejected at build
    pub fn timeout_secs(mut self, secs: f64) -> Self {
        match Duration::try_from_secs_f64(secs) {
            Ok(timeout) => self.timeout = Some(timeout),
            Err(_) => self.rejected = Some(format!("invalid timeout {secs}")),
        }
        self
    }

    pub fn stdin(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(payload.into());
        self
    }

    pub fn stdout_tee(mut self, sink: impl TeeSink + 'static) -> Self {
        self.stdout_tee = Some(Box::new(sink));
        self
    }

    pub fn stderr_tee(mut self, sink: impl TeeSink + 'static) -> Self {
        self.stderr_tee = Some(Box::new(sink));
        self
    }

    pub fn quit_when(mut self, predicate: impl QuitPredicate + 'static) -> Self {
        self.quit = Some(Box::new(predicate));
        self
    }

    pub(crate) fn boxed_tee(mut self, stream: Stream, sink: Box<dyn TeeSink>) -> Self {
        match stream {
            Stream::Stdout => self.stdout_tee = Some(sink),
            Stream::Stderr => self.stderr_tee = Some(sink),
        }
        self
    }

    pub(crate) fn boxed_quit(mut self, predicate: Box<dyn QuitPredicate>) -> Self {
        self.quit = Some(predicate);
        self
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn registry(mut self, registry: ProcessRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn reporter(mut self, reporter: ResultReporter) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn capture_stdout(mut self, keep: bool) -> Self {
        self.capture_stdout = keep;
        self
    }

    pub fn capture_stderr(mut self, keep: bool) -> Self {
        self.capture_stderr = keep;
        self
    }

    pub fn flush_tee(mut self, flush: bool) -> Self {
        self.flush_tee = flush;
        self
    }

    pub fn silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    /// Override the configured dry-run mode for this job
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = Some(dry_run);
        self
    }

    /// Validate everything that can be checked before spawning
    pub fn build(self) -> ExecResult<ProcessJob> {
        if let Some(reason) = self.rejected {
            return Err(ExecError::InvalidConfig(reason));
        }
        if self.timeout.is_some_and(|t| t.is_zero()) {
            return Err(ExecError::InvalidConfig(
                "timeout must be positive".to_string(),
            ));
        }
        self.command.validate()?;
        self.config.validate()?;

        let display = self.command.to_string();
        let key = self.key.unwrap_or_else(|| display.clone());
        let registry = self.registry.unwrap_or_default();
        let control = registry.control(key.clone(), self.config.process_group);
        let trace_id = generate_trace_id();
        let span = job_span(control.id(), &key, &trace_id);

        let mut mux = OutputMultiplexer::new(self.config.read_chunk);
        mux.set_capture(Stream::Stdout, self.capture_stdout);
        mux.set_capture(Stream::Stderr, self.capture_stderr);
        mux.set_flush_tee(self.flush_tee);
        if let Some(sink) = self.stdout_tee {
            mux.set_tee(Stream::Stdout, sink);
        }
        if let Some(sink) = self.stderr_tee {
            mux.set_tee(Stream::Stderr, sink);
        }

        Ok(ProcessJob {
            dry_run: self.dry_run.unwrap_or(self.config.dry_run),
            command: self.command,
            display,
            key,
            config: self.config,
            timeout: self.timeout,
            stdin_payload: self.stdin,
            quit: self.quit,
            registry,
            reporter: self.reporter,
            silent: self.silent,
            control,
            trace_id,
            span,
            mux: Some(mux),
            running: None,
            supervisor: None,
            state: JobState::Created,
            killed: false,
            wait_failure: None,
            outcome: None,
            exit: None,
            started_at: None,
            started: None,
            finished: None,
        })
    }
}

/// One external command, run at most once
pub struct ProcessJob {
    command: CommandSpec,
    display: String,
    key: String,
    config: Arc<ExecConfig>,
    timeout: Option<Duration>,
    stdin_payload: Option<Vec<u8>>,
    quit: Option<Box<dyn QuitPredicate>>,
    registry: ProcessRegistry,
    reporter: Option<ResultReporter>,
    silent: bool,
    dry_run: bool,
    control: Arc<JobControl>,
    trace_id: String,
    span: Span,
    mux: Option<OutputMultiplexer>,
    running: Option<Running>,
    supervisor: Option<TimeoutSupervisor>,
    state: JobState,
    killed: bool,
    wait_failure: Option<String>,
    outcome: Option<Outcome>,
    exit: Option<ExitInfo>,
    started_at: Option<SystemTime>,
    started: Option<Instant>,
    finished: Option<Instant>,
}

impl ProcessJob {
    pub fn builder(command: impl Into<CommandSpec>) -> JobBuilder {
        JobBuilder::new(command)
    }

    pub fn id(&self) -> JobId {
        self.control.id()
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn command(&self) -> &CommandSpec {
        &self.command
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    /// OS pid while the child has not been reaped
    pub fn pid(&self) -> Option<OsPid> {
        self.control.pid()
    }

    pub fn is_started(&self) -> bool {
        self.state != JobState::Created
    }

    pub fn is_finalized(&self) -> bool {
        self.state == JobState::Finalized
    }

    pub fn was_killed(&self) -> bool {
        self.killed
    }

    /// Absolute deadline, once started with a timeout
    pub fn deadline(&self) -> Option<Instant> {
        self.supervisor.as_ref().and_then(TimeoutSupervisor::deadline)
    }

    /// Start, wait and finalize: the usual way to run a job
    pub fn run(mut self) -> ExecResult<CommandResult> {
        self.start()?;
        match self.wait_loop() {
            Ok(()) => self.finalize(),
            Err(e) => self.abandon(e),
        }
    }

    /// Stop and finalize after the wait loop failed
    ///
    /// The failure is recorded in `stream_errors`; output read so far is kept.
    fn abandon(&mut self, failure: ExecError) -> ExecResult<CommandResult> {
        {
            let _span = self.span.clone().entered();
            error!(error = %failure, "Wait loop failed, terminating");
        }
        self.wait_failure = Some(format!("wait: {failure}"));
        self.terminate()?;
        self.finalize()
    }

    /// Spawn the process and register it
    pub fn start(&mut self) -> ExecResult<()> {
        let _span = self.span.clone().entered();
        if self.state != JobState::Created {
            return Err(ExecError::AlreadyStarted(self.display.clone()));
        }

        if self.dry_run {
            info!(command = %self.display, "[dry run] not executing");
            self.state = JobState::Running;
            self.outcome = Some(Outcome::DryRun);
            self.exit = Some(ExitInfo {
                status: 0,
                signal: None,
            });
            return Ok(());
        }

        let mut cmd = self.command.to_command(&self.config);
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        cmd.stdin(if self.stdin_payload.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });

        let mut child = cmd.spawn().map_err(|source| {
            error!(command = %self.display, error = %source, "Failed to launch");
            ExecError::Launch {
                command: self.display.clone(),
                source,
            }
        })?;
        let started = Instant::now();

        let pipes = match self.prepare_pipes(&mut child) {
            Ok(pipes) => pipes,
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(e);
            }
        };

        let pid = child.id() as OsPid;
        self.running = Some(Running {
            child,
            stdout: pipes.stdout,
            stderr: pipes.stderr,
            stdin: pipes.stdin,
        });
        self.control.attach(pid);
        self.registry.register(Arc::clone(&self.control));
        self.supervisor = Some(TimeoutSupervisor::new(
            self.config.tick,
            started,
            self.timeout,
        ));
        self.started = Some(started);
        self.started_at = Some(SystemTime::now());
        self.state = JobState::Running;

        info!(command = %self.display, pid, timeout = ?self.timeout, "Spawned process");
        Ok(())
    }

    /// Take the pipes out of the child and switch them to non-blocking mode
    fn prepare_pipes(&mut self, child: &mut Child) -> ExecResult<PreparedPipes> {
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let stdin = child.stdin.take();

        if let Some(ref pipe) = stdout {
            set_nonblocking(pipe)?;
        }
        if let Some(ref pipe) = stderr {
            set_nonblocking(pipe)?;
        }
        let stdin = match (stdin, self.stdin_payload.take()) {
            (Some(pipe), Some(payload)) => {
                set_nonblocking(&pipe)?;
                Some(StdinFeeder::new(pipe, payload, self.config.stdin_chunk))
            }
            _ => None,
        };

        Ok(PreparedPipes {
            stdout,
            stderr,
            stdin,
        })
    }

    /// Tick until the process exits or the supervisor decides to stop it
    pub fn wait_loop(&mut self) -> ExecResult<()> {
        let _span = self.span.clone().entered();
        match self.state {
            JobState::Created => return Err(ExecError::NotStarted(self.display.clone())),
            JobState::Finalized => return Ok(()),
            JobState::Running => {}
        }
        if self.exit.is_some() {
            return Ok(());
        }

        loop {
            let budget = self
                .supervisor
                .as_ref()
                .map(|s| s.wait_budget(Instant::now()))
                .unwrap_or(self.config.tick);
            self.pump(budget)?;

            let quit_requested = self.quit.as_mut().is_some_and(|q| q.should_quit());
            let interrupted = self.control.is_interrupted();
            let exited = if quit_requested || interrupted {
                false
            } else {
                self.poll_exit()?
            };
            let state = TickState {
                quit_requested,
                interrupted,
                exited,
            };

            let verdict = match self.supervisor.as_mut() {
                Some(supervisor) => supervisor.evaluate(state, Instant::now()),
                None => return Err(ExecError::NotStarted(self.display.clone())),
            };

            match verdict {
                TickVerdict::Continue => continue,
                TickVerdict::Exited => break,
                TickVerdict::Quit => {
                    info!("Quit predicate fired, stopping process");
                    self.outcome = Some(Outcome::Cancelled);
                }
                TickVerdict::Interrupted => {
                    warn!("Externally triggered termination");
                    self.outcome = Some(Outcome::Interrupted);
                }
                TickVerdict::DeadlineExceeded => {
                    warn!(timeout = ?self.timeout, "Deadline exceeded, terminating");
                    self.outcome = Some(Outcome::TimedOut);
                }
            }
            self.terminate()?;
            break;
        }
        Ok(())
    }

    /// Wait for output up to `wait`; with every pipe closed only the exit is
    /// left to watch, so sleep the short exit-poll interval instead
    fn pump(&mut self, wait: Duration) -> ExecResult<usize> {
        if let (Some(mux), Some(running)) = (self.mux.as_mut(), self.running.as_mut()) {
            let mut endpoints = running.endpoints();
            if mux.has_open_endpoints(&endpoints) {
                return mux.pump(&mut endpoints, wait);
            }
        }
        std::thread::sleep(wait.min(EXIT_POLL_INTERVAL));
        Ok(0)
    }

    /// Non-blocking exit check; records the status on exit
    fn poll_exit(&mut self) -> ExecResult<bool> {
        if self.exit.is_some() {
            return Ok(true);
        }
        let Some(running) = self.running.as_mut() else {
            return Ok(false);
        };
        let status = self
            .control
            .reap(|| running.child.try_wait())
            .map_err(|e| ExecError::io("polling child status", e))?;
        match status {
            Some(status) => {
                self.record_exit(status);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn record_exit(&mut self, status: ExitStatus) {
        let info = ExitInfo::from(status);
        self.exit = Some(info);
        self.finished = Some(Instant::now());
        debug!(status = info.status, signal = ?info.signal, "Process exited");
    }

    /// Keep draining output while waiting up to `grace` for the exit
    fn wait_for_exit(&mut self, grace: Duration) -> ExecResult<bool> {
        let until = Instant::now() + grace;
        loop {
            if self.poll_exit()? {
                return Ok(true);
            }
            let now = Instant::now();
            if now >= until {
                return Ok(false);
            }
            let wait = EXIT_POLL_INTERVAL.min(until - now);
            if let Err(e) = self.pump(wait) {
                debug!(error = %e, "Pump failed during grace period");
                std::thread::sleep(wait);
            }
        }
    }

    /// Stop the process: SIGTERM, then SIGKILL after the grace period
    ///
    /// On a process that already exited this only returns its status.
    pub fn terminate(&mut self) -> ExecResult<ExitInfo> {
        let _span = self.span.clone().entered();
        if self.state == JobState::Created {
            return Err(ExecError::NotStarted(self.display.clone()));
        }
        if let Some(exit) = self.exit {
            return Ok(exit);
        }
        if self.poll_exit()? {
            return self.exit_info();
        }

        self.killed = true;
        self.outcome.get_or_insert(Outcome::Interrupted);

        warn!(pid = ?self.control.pid(), "Sending SIGTERM");
        self.control.signal(Signal::SIGTERM)?;
        if self.wait_for_exit(self.config.terminate_grace)? {
            return self.exit_info();
        }

        warn!(
            grace = ?self.config.terminate_grace,
            "Process ignored SIGTERM, escalating to SIGKILL"
        );
        self.control.signal(Signal::SIGKILL)?;
        if self.wait_for_exit(self.config.kill_grace)? {
            return self.exit_info();
        }

        // Nothing can be signalled after this point
        self.control.detach();
        let status = match self.running.as_mut() {
            Some(running) => running
                .child
                .wait()
                .map_err(|e| ExecError::io("waiting for killed process", e))?,
            None => return Err(ExecError::NotStarted(self.display.clone())),
        };
        self.record_exit(status);
        self.exit_info()
    }

    fn exit_info(&self) -> ExecResult<ExitInfo> {
        self.exit
            .ok_or_else(|| ExecError::StillRunning(self.display.clone()))
    }

    /// Drain, close, deregister and build the result, exactly once
    pub fn finalize(&mut self) -> ExecResult<CommandResult> {
        let _span = self.span.clone().entered();
        match self.state {
            JobState::Created => return Err(ExecError::NotStarted(self.display.clone())),
            JobState::Finalized => return Err(ExecError::AlreadyFinalized(self.display.clone())),
            JobState::Running => {}
        }
        if !self.poll_exit()? {
            return Err(ExecError::StillRunning(self.display.clone()));
        }

        let mut running = self.running.take();
        let mut captured = match self.mux.take() {
            Some(mut mux) => {
                if let Some(running) = running.as_mut() {
                    mux.drain(&mut running.endpoints());
                    if let Some(feeder) = running.stdin.as_mut() {
                        feeder.close();
                    }
                }
                mux.finish()
            }
            None => Default::default(),
        };
        drop(running);

        self.registry.deregister(self.control.id());
        self.state = JobState::Finalized;

        captured.errors.extend(self.wait_failure.take());

        let outcome = self.outcome.unwrap_or(Outcome::Completed);
        let result = if outcome == Outcome::DryRun {
            CommandResult::dry_run(self.display.clone(), self.key.clone())
        } else {
            let exit = self.exit_info()?;
            let duration = match (self.started, self.finished) {
                (Some(start), Some(end)) => end.saturating_duration_since(start),
                _ => Duration::ZERO,
            };
            CommandResult {
                command: self.display.clone(),
                key: self.key.clone(),
                stdout: captured.stdout,
                stderr: captured.stderr,
                exit_status: Some(exit.status),
                signal: exit.signal,
                duration,
                timed_out: outcome == Outcome::TimedOut,
                killed: self.killed,
                outcome,
                started_at: self.started_at,
                stream_errors: captured.errors,
            }
        };

        if result.success() {
            info!(
                status = ?result.exit_status,
                duration_ms = result.duration.as_millis() as u64,
                "Command finished"
            );
        } else {
            error!(
                status = ?result.exit_status,
                outcome = result.outcome.as_str(),
                killed = result.killed,
                duration_ms = result.duration.as_millis() as u64,
                "Command failed"
            );
        }

        if !self.silent {
            if let Some(reporter) = self.reporter.as_ref() {
                if let Err(e) = reporter.report(&result) {
                    warn!(error = %e, "Failed to write result report");
                }
            }
        }
        Ok(result)
    }

    /// Terminate then finalize, for callers driving the job by hand
    pub fn stop(&mut self) -> ExecResult<CommandResult> {
        self.terminate()?;
        self.finalize()
    }
}

impl Drop for ProcessJob {
    fn drop(&mut self) {
        if self.state != JobState::Running {
            return;
        }
        if matches!(self.poll_exit(), Ok(false)) {
            let _span = self.span.clone().entered();
            warn!("Job dropped while running, killing process");
            let _ = self.control.signal(Signal::SIGKILL);
        }
        if self.exit.is_none() {
            self.control.detach();
            if let Some(running) = self.running.as_mut() {
                let _ = running.child.wait();
            }
        }
        self.registry.deregister(self.control.id());
    }
}

struct PreparedPipes {
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
    stdin: Option<StdinFeeder>,
}

fn set_nonblocking(fd: &impl AsRawFd) -> ExecResult<()> {
    let raw = fd.as_raw_fd();
    let flags = fcntl(raw, FcntlArg::F_GETFL)
        .map_err(|e| ExecError::io("reading pipe flags", e.into()))?;
    let flags = OFlag::from_bits_truncate(flags) | OFlag::O_NONBLOCK;
    fcntl(raw, FcntlArg::F_SETFL(flags))
        .map_err(|e| ExecError::io("setting pipe non-blocking", e.into()))?;
    Ok(())
}

/*!
 * Execution Configuration
 *
 * Engine-wide settings: tick granularity, termination grace periods, shell,
 * chunk sizes and dry-run mode.
 */

use crate::core::limits::*;
use crate::core::{ExecError, ExecResult};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration shared by every job an executor runs
#[derive(Debug, Clone)]
pub struct ExecConfig {
    /// Upper bound for one wait-loop iteration (default: 1s)
    pub tick: Duration,

    /// Wait after SIGTERM before escalating to SIGKILL (default: 1s)
    pub terminate_grace: Duration,

    /// Wait after SIGKILL before a blocking reap (default: 1s)
    pub kill_grace: Duration,

    /// Shell used for command lines (default: /bin/sh)
    pub shell: PathBuf,

    /// LANG exported to every child, if set
    pub lang: Option<String>,

    /// Bytes written to stdin per ready tick (at least 512)
    pub stdin_chunk: usize,

    /// Bytes requested per read
    pub read_chunk: usize,

    /// Put each child in its own process group and signal the whole group
    pub process_group: bool,

    /// Log commands instead of running them
    pub dry_run: bool,

    /// How often the interrupt supervisor checks for a pending SIGINT
    pub interrupt_poll: Duration,
}

impl ExecConfig {
    /// Create default configuration
    pub fn new() -> Self {
        Self {
            tick: DEFAULT_TICK,
            terminate_grace: DEFAULT_TERMINATE_GRACE,
            kill_grace: DEFAULT_KILL_GRACE,
            shell: PathBuf::from(DEFAULT_SHELL),
            lang: Some(DEFAULT_LANG.to_string()),
            stdin_chunk: PIPE_ATOMIC_WRITE,
            read_chunk: DEFAULT_READ_CHUNK,
            process_group: true,
            dry_run: false,
            interrupt_poll: INTERRUPT_POLL_INTERVAL,
        }
    }

    /// Short tick and grace periods, for interactive use and tests
    pub fn responsive() -> Self {
        Self {
            tick: RESPONSIVE_TICK,
            terminate_grace: Duration::from_millis(200),
            kill_grace: Duration::from_millis(200),
            ..Self::new()
        }
    }

    /// Generous grace periods for commands that shut down slowly
    pub fn relaxed() -> Self {
        Self {
            terminate_grace: Duration::from_secs(5),
            kill_grace: Duration::from_secs(5),
            ..Self::new()
        }
    }

    /// Load defaults overridden by environment variables
    ///
    /// - `CMDJOB_SHELL`: shell path
    /// - `CMDJOB_TICK_MS`: tick in milliseconds
    /// - `CMDJOB_GRACE_MS`: SIGTERM grace in milliseconds
    /// - `CMDJOB_LANG`: LANG for children (empty disables)
    /// - `CMDJOB_DRY_RUN`: `1`/`true` to enable dry-run mode
    pub fn from_env() -> ExecResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ExecResult<Self> {
        let mut config = Self::new();

        if let Some(shell) = lookup("CMDJOB_SHELL") {
            config.shell = PathBuf::from(shell);
        }
        if let Some(ms) = lookup("CMDJOB_TICK_MS") {
            config.tick = Duration::from_millis(parse_millis("CMDJOB_TICK_MS", &ms)?);
        }
        if let Some(ms) = lookup("CMDJOB_GRACE_MS") {
            config.terminate_grace = Duration::from_millis(parse_millis("CMDJOB_GRACE_MS", &ms)?);
        }
        if let Some(lang) = lookup("CMDJOB_LANG") {
            config.lang = if lang.is_empty() { None } else { Some(lang) };
        }
        if let Some(flag) = lookup("CMDJOB_DRY_RUN") {
            config.dry_run = flag == "1" || flag.eq_ignore_ascii_case("true");
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub fn with_terminate_grace(mut self, grace: Duration) -> Self {
        self.terminate_grace = grace;
        self
    }

    pub fn with_shell(mut self, shell: impl Into<PathBuf>) -> Self {
        self.shell = shell.into();
        self
    }

    pub fn with_lang(mut self, lang: Option<String>) -> Self {
        self.lang = lang;
        self
    }

    pub fn with_stdin_chunk(mut self, chunk: usize) -> Self {
        self.stdin_chunk = chunk;
        self
    }

    pub fn with_process_group(mut self, enabled: bool) -> Self {
        self.process_group = enabled;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Reject settings the wait loop cannot honour
    pub fn validate(&self) -> ExecResult<()> {
        if self.tick.is_zero() || self.tick > MAX_TICK {
            return Err(ExecError::InvalidConfig(format!(
                "tick must be between 1ms and {:?}, got {:?}",
                MAX_TICK, self.tick
            )));
        }
        if self.interrupt_poll.is_zero() {
            return Err(ExecError::InvalidConfig(
                "interrupt poll interval must be positive".to_string(),
            ));
        }
        if self.stdin_chunk < PIPE_ATOMIC_WRITE {
            return Err(ExecError::InvalidConfig(format!(
                "stdin chunk must be at least {} bytes, got {}",
                PIPE_ATOMIC_WRITE, self.stdin_chunk
            )));
        }
        if self.read_chunk == 0 {
            return Err(ExecError::InvalidConfig(
                "read chunk must be positive".to_string(),
            ));
        }
        if self.shell.as_os_str().is_empty() {
            return Err(ExecError::InvalidConfig("shell path is empty".to_string()));
        }
        Ok(())
    }
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_millis(var: &str, value: &str) -> ExecResult<u64> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|e| ExecError::InvalidConfig(format!("{var}={value:?}: {e}")))
}

/*!
 * Engine Limits and Constants
 *
 * Centralized location for tick intervals, grace periods, chunk sizes and
 * shell defaults used by the execution engine.
 */

use std::time::Duration;

// =============================================================================
// WAIT LOOP
// =============================================================================

/// Default wait-loop tick (1s)
/// Upper bound on how late a deadline, quit predicate or interrupt is noticed
pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

/// Tick used by the responsive preset (100ms)
pub const RESPONSIVE_TICK: Duration = Duration::from_millis(100);

/// Largest tick accepted by the readiness wait (poll(2) takes milliseconds)
pub const MAX_TICK: Duration = Duration::from_millis(u16::MAX as u64);

// =============================================================================
// TERMINATION
// =============================================================================

/// Time a process gets to exit after SIGTERM before SIGKILL is sent
pub const DEFAULT_TERMINATE_GRACE: Duration = Duration::from_secs(1);

/// Time to wait for exit after SIGKILL before falling back to a blocking wait
pub const DEFAULT_KILL_GRACE: Duration = Duration::from_secs(1);

/// Interval between exit checks while waiting out a grace period
pub const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Exit status offset for processes killed by a signal (shell convention)
pub const SIGNAL_EXIT_BASE: i32 = 128;

// =============================================================================
// PIPE I/O
// =============================================================================

/// POSIX minimum for PIPE_BUF; writes up to this size are atomic
/// [LINUX-COMPAT] Linux guarantees 4096, POSIX only 512
pub const PIPE_ATOMIC_WRITE: usize = 512;

/// Bytes requested per non-blocking read
pub const DEFAULT_READ_CHUNK: usize = 4096;

// =============================================================================
// INTERRUPTS
// =============================================================================

/// How often the interrupt supervisor checks the pending-interrupt flag
pub const INTERRUPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

// =============================================================================
// SHELL
// =============================================================================

/// Shell used for command lines
pub const DEFAULT_SHELL: &str = "/bin/sh";

/// Locale exported to shell commands so tool output is predictable
pub const DEFAULT_LANG: &str = "en_US.UTF-8";

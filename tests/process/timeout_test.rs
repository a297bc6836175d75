/*!
 * Timeout Tests
 * Deadline enforcement and SIGTERM to SIGKILL escalation
 */

use cmdjob::{ExecConfig, ExecError, Executor, Outcome, RunOptions};
use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use std::time::{Duration, Instant};

fn executor() -> Executor {
    Executor::new(ExecConfig::responsive()).unwrap()
}

#[test]
fn test_sleep_past_timeout() {
    let executor = executor();
    let mut job = executor
        .job("sleep 5")
        .timeout(Duration::from_secs(1))
        .build()
        .unwrap();

    let start = Instant::now();
    job.start().unwrap();
    let pid = job.pid().unwrap();
    assert!(job.deadline().is_some());
    job.wait_loop().unwrap();
    let result = job.finalize().unwrap();
    let elapsed = start.elapsed();

    assert!(result.timed_out);
    assert!(result.killed);
    assert_eq!(result.outcome, Outcome::TimedOut);
    assert!(elapsed >= Duration::from_secs(1));
    assert!(elapsed < Duration::from_secs(2), "took {elapsed:?}");
    assert_eq!(kill(Pid::from_raw(pid), None), Err(Errno::ESRCH));
    assert!(matches!(result.check(), Err(ExecError::TimedOut { .. })));
}

#[test]
fn test_fast_command_beats_deadline() {
    let result = executor()
        .run(
            "echo done",
            RunOptions::new().with_timeout(Duration::from_secs(5)),
        )
        .unwrap();

    assert!(!result.timed_out);
    assert!(!result.killed);
    assert_eq!(result.stdout_str(), "done\n");
    assert!(result.duration < Duration::from_secs(2));
}

#[test]
fn test_ignored_sigterm_escalates_to_sigkill() {
    let start = Instant::now();
    let result = executor()
        .run(
            "trap '' TERM; sleep 5",
            RunOptions::new().with_timeout(Duration::from_millis(500)),
        )
        .unwrap();

    assert!(result.timed_out);
    assert!(result.killed);
    assert_eq!(result.signal, Some(9));
    assert_eq!(result.exit_status, Some(137));
    assert!(start.elapsed() < Duration::from_secs(3));
}

#[test]
fn test_output_before_timeout_is_kept() {
    let result = executor()
        .run(
            "echo partial; sleep 5",
            RunOptions::new().with_timeout(Duration::from_millis(500)),
        )
        .unwrap();

    assert!(result.timed_out);
    assert_eq!(result.stdout_str(), "partial\n");
}

#[test]
fn test_pipeline_is_killed_as_a_group() {
    let start = Instant::now();
    let result = executor()
        .run(
            "sleep 5 | sleep 5",
            RunOptions::new().with_timeout(Duration::from_millis(300)),
        )
        .unwrap();

    assert!(result.timed_out);
    assert!(start.elapsed() < Duration::from_secs(2));
}

#[test]
fn test_timeout_on_default_tick() {
    let executor = Executor::new(ExecConfig::new()).unwrap();
    let start = Instant::now();
    let result = executor
        .run(
            "sleep 5",
            RunOptions::new().with_timeout(Duration::from_secs(1)),
        )
        .unwrap();
    let elapsed = start.elapsed();

    assert!(result.timed_out);
    assert_eq!(result.outcome, Outcome::TimedOut);
    assert!(elapsed >= Duration::from_secs(1));
    assert!(elapsed < Duration::from_millis(2500));
}

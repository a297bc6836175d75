/*!
 * Job Lifecycle Tests
 * Capture, exit codes, launch failures and lifecycle misuse
 */

use cmdjob::{CommandSpec, ExecConfig, ExecError, Executor, Outcome, ProcessJob, RunOptions};
use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use pretty_assertions::assert_eq;
use std::time::{Duration, Instant};

fn executor() -> Executor {
    Executor::new(ExecConfig::responsive()).unwrap()
}

#[test]
fn test_echo_hi() {
    let result = executor().run("echo hi", RunOptions::new()).unwrap();

    assert_eq!(result.stdout, b"hi\n");
    assert!(result.stderr.is_empty());
    assert_eq!(result.exit_status, Some(0));
    assert!(!result.timed_out);
    assert!(!result.killed);
    assert_eq!(result.outcome, Outcome::Completed);
    assert!(result.success());
}

#[test]
fn test_nonzero_exit_is_data() {
    let result = executor().run("exit 7", RunOptions::new()).unwrap();

    assert_eq!(result.exit_status, Some(7));
    assert!(!result.timed_out);
    assert!(!result.success());
    assert!(matches!(
        result.check(),
        Err(ExecError::NonZeroExit { status: 7, .. })
    ));
}

#[test]
fn test_stderr_captured_separately() {
    let result = executor()
        .run("echo out; echo err >&2; exit 3", RunOptions::new())
        .unwrap();

    assert_eq!(result.stdout_str(), "out\n");
    assert_eq!(result.stderr_str(), "err\n");
    assert_eq!(result.exit_status, Some(3));
}

#[test]
fn test_large_output_on_both_streams() {
    // Each stream exceeds a pipe buffer; reading only one would deadlock
    let result = executor()
        .run("seq 1 20000; seq 1 20000 >&2", RunOptions::new())
        .unwrap();

    let expected: String = (1..=20000).map(|i| format!("{i}\n")).collect();
    assert!(expected.len() > 64 * 1024);
    assert_eq!(result.stdout_str(), expected);
    assert_eq!(result.stderr_str(), expected);
    assert_eq!(result.exit_status, Some(0));
}

#[test]
fn test_exec_without_shell() {
    let spec = CommandSpec::exec("/bin/echo", ["a", "b c"]);
    let result = executor().run(spec, RunOptions::new()).unwrap();
    assert_eq!(result.stdout_str(), "a b c\n");
    assert_eq!(result.command, "/bin/echo a b c");
}

#[test]
fn test_launch_failure_registers_nothing() {
    let executor = executor();
    let spec = CommandSpec::exec("/nonexistent/cmdjob-test-binary", Vec::<String>::new());
    let err = executor.run(spec, RunOptions::new()).unwrap_err();

    assert!(err.is_launch_failure());
    assert!(executor.registry().is_empty());
}

#[test]
fn test_missing_shell_is_launch_failure() {
    let config = ExecConfig::responsive().with_shell("/nonexistent/shell");
    let err = Executor::new(config)
        .unwrap()
        .run("echo hi", RunOptions::new())
        .unwrap_err();
    assert!(err.is_launch_failure());
}

#[test]
fn test_start_twice_fails_without_crash() {
    let executor = executor();
    let mut job = executor.job("true").build().unwrap();

    job.start().unwrap();
    assert!(matches!(job.start(), Err(ExecError::AlreadyStarted(_))));

    job.wait_loop().unwrap();
    let result = job.finalize().unwrap();
    assert_eq!(result.exit_status, Some(0));
    assert!(matches!(job.finalize(), Err(ExecError::AlreadyFinalized(_))));
    assert!(executor.registry().is_empty());
}

#[test]
fn test_finalize_refuses_running_process() {
    let executor = executor();
    let mut job = executor.job("sleep 5").build().unwrap();
    job.start().unwrap();
    assert_eq!(executor.registry().len(), 1);

    assert!(matches!(job.finalize(), Err(ExecError::StillRunning(_))));

    let result = job.stop().unwrap();
    assert!(result.killed);
    assert_eq!(result.outcome, Outcome::Interrupted);
    assert_eq!(result.signal, Some(15));
    assert_eq!(result.exit_status, Some(143));
    assert!(executor.registry().is_empty());
}

#[test]
fn test_terminate_after_exit_sends_nothing() {
    let mut job = ProcessJob::builder("exit 4")
        .config(ExecConfig::responsive().into())
        .build()
        .unwrap();
    job.start().unwrap();
    job.wait_loop().unwrap();

    let exit = job.terminate().unwrap();
    assert_eq!(exit.status, 4);
    assert!(!job.was_killed());
    let result = job.finalize().unwrap();
    assert_eq!(result.outcome, Outcome::Completed);
    assert!(!result.killed);
}

#[test]
fn test_quit_predicate_cancels() {
    let start = Instant::now();
    let result = executor()
        .run(
            "sleep 5",
            RunOptions::new().with_quit(move || start.elapsed() > Duration::from_millis(300)),
        )
        .unwrap();

    assert_eq!(result.outcome, Outcome::Cancelled);
    assert!(result.killed);
    assert!(!result.timed_out);
    assert!(start.elapsed() < Duration::from_secs(3));
    assert!(matches!(result.check(), Err(ExecError::Cancelled { .. })));
}

#[test]
fn test_drop_kills_running_process() {
    let executor = executor();
    let mut job = executor.job("sleep 30").build().unwrap();
    job.start().unwrap();
    let pid = job.pid().unwrap();

    drop(job);

    assert_eq!(kill(Pid::from_raw(pid), None), Err(Errno::ESRCH));
    assert!(executor.registry().is_empty());
}

#[test]
fn test_caller_key_is_reported() {
    let result = executor()
        .run("true", RunOptions::new().with_key("noop"))
        .unwrap();
    assert_eq!(result.key, "noop");
    assert_eq!(result.command, "true");
}

#[test]
fn test_result_serializes() {
    let result = executor().run("printf abc", RunOptions::new()).unwrap();
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["stdout"], "abc");
    assert_eq!(json["exit_status"], 0);
    assert_eq!(json["timed_out"], false);
    assert_eq!(json["outcome"], "completed");
}

#[test]
fn test_default_tick_does_not_delay_exit() {
    let executor = Executor::new(ExecConfig::new()).unwrap();
    for _ in 0..10 {
        let start = Instant::now();
        let result = executor.run("echo hi", RunOptions::new()).unwrap();

        assert_eq!(result.stdout, b"hi\n");
        assert!(start.elapsed() < Duration::from_millis(500));
        assert!(result.duration < Duration::from_millis(500));
    }
}

#[test]
fn test_closed_pipes_before_exit_on_default_tick() {
    let executor = Executor::new(ExecConfig::new()).unwrap();
    let start = Instant::now();
    let result = executor
        .run("exec >&- 2>&-; sleep 0.05", RunOptions::new())
        .unwrap();

    assert_eq!(result.exit_status, Some(0));
    assert!(result.stdout.is_empty());
    assert!(start.elapsed() < Duration::from_millis(500));
    assert!(result.duration < Duration::from_millis(500));
}

#[test]
fn test_background_descendant_does_not_block_result() {
    // the backgrounded sleep keeps the write end of stdout open after the shell exits
    let start = Instant::now();
    let result = executor().run("sleep 3 & echo hi", RunOptions::new()).unwrap();

    assert_eq!(result.stdout_str(), "hi\n");
    assert_eq!(result.exit_status, Some(0));
    assert_eq!(result.outcome, Outcome::Completed);
    assert!(start.elapsed() < Duration::from_secs(1));
}

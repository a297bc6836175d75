/*!
 * Tee Sink and Report Tests
 */

use cmdjob::{ExecConfig, Executor, ResultReporter, RunOptions, SharedBuffer};
use std::io::{self, Read, Write};

fn executor() -> Executor {
    Executor::new(ExecConfig::responsive()).unwrap()
}

struct BrokenSink;

impl Write for BrokenSink {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::other("sink closed"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_concurrent_tees_and_reports_do_not_mix() {
    let log = SharedBuffer::new();
    let executor = executor().with_reporter(ResultReporter::new(log.clone()));

    let tee_a = SharedBuffer::new();
    let tee_b = SharedBuffer::new();
    let command_a = "for i in 1 2 3; do echo A$i; sleep 0.05; done";
    let command_b = "for i in 1 2 3; do echo B$i; sleep 0.05; done";

    let a = executor
        .spawn(command_a, RunOptions::new().with_stdout_tee(tee_a.clone()))
        .unwrap();
    let b = executor
        .spawn(command_b, RunOptions::new().with_stdout_tee(tee_b.clone()))
        .unwrap();
    let result_a = a.join().unwrap().unwrap();
    let result_b = b.join().unwrap().unwrap();

    assert_eq!(tee_a.contents_lossy(), "A1\nA2\nA3\n");
    assert_eq!(tee_b.contents_lossy(), "B1\nB2\nB3\n");
    assert_eq!(result_a.stdout_str(), "A1\nA2\nA3\n");
    assert_eq!(result_b.stdout_str(), "B1\nB2\nB3\n");

    let log = log.contents_lossy();
    let blocks: Vec<&str> = log
        .split("command [")
        .filter(|block| !block.is_empty())
        .collect();
    assert_eq!(blocks.len(), 2);
    for block in blocks {
        if block.starts_with(command_a) {
            assert!(block.contains("stdout = [A1\nA2\nA3\n]\n"));
        } else {
            assert!(block.starts_with(command_b));
            assert!(block.contains("stdout = [B1\nB2\nB3\n]\n"));
        }
    }
}

#[test]
fn test_file_tee_without_capture() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let sink = file.reopen().unwrap();

    let result = executor()
        .run(
            "seq 1 1000",
            RunOptions::new().with_stdout_tee(sink).discard_stdout(),
        )
        .unwrap();

    assert!(result.stdout.is_empty());
    let mut written = String::new();
    file.reopen().unwrap().read_to_string(&mut written).unwrap();
    let expected: String = (1..=1000).map(|i| format!("{i}\n")).collect();
    assert_eq!(written, expected);
}

#[test]
fn test_failing_tee_is_detached() {
    let result = executor()
        .run(
            "echo still captured",
            RunOptions::new().with_stdout_tee(BrokenSink),
        )
        .unwrap();

    assert_eq!(result.stdout_str(), "still captured\n");
    assert_eq!(result.exit_status, Some(0));
}

#[test]
fn test_stderr_tee_with_flush() {
    let tee = SharedBuffer::new();
    let result = executor()
        .run(
            "echo warn >&2",
            RunOptions::new().with_stderr_tee(tee.clone()).with_flush_tee(),
        )
        .unwrap();

    assert_eq!(tee.contents_lossy(), "warn\n");
    assert_eq!(result.stderr_str(), "warn\n");
}

#[test]
fn test_silent_job_is_not_reported() {
    let log = SharedBuffer::new();
    let executor = executor().with_reporter(ResultReporter::new(log.clone()));
    executor.run("true", RunOptions::new().silent()).unwrap();
    assert!(log.is_empty());
}

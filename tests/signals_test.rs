/*!
 * Interrupt Controller Tests
 * The SIGINT disposition is process-wide, so every test here runs serially
 */

use cmdjob::{ExecConfig, Executor, InterruptController, Outcome, ProcessRegistry, RunOptions};
use nix::sys::signal::{raise, Signal};
use serial_test::serial;
use std::time::{Duration, Instant};

fn executor(registry: &ProcessRegistry) -> Executor {
    Executor::new(ExecConfig::responsive())
        .unwrap()
        .with_registry(registry.clone())
}

fn wait_for_jobs(registry: &ProcessRegistry, count: usize) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while registry.len() < count {
        assert!(Instant::now() < deadline, "jobs never registered");
        std::thread::sleep(Duration::from_millis(10));
    }
}

#[test]
#[serial]
fn test_install_is_exclusive() {
    let registry = ProcessRegistry::new();

    assert!(InterruptController::install(&registry).unwrap());
    assert!(InterruptController::is_installed());
    assert!(!InterruptController::install(&registry).unwrap());

    assert!(InterruptController::remove().unwrap());
    assert!(!InterruptController::is_installed());
    assert!(!InterruptController::remove().unwrap());
}

#[test]
#[serial]
fn test_sigint_terminates_running_jobs() {
    let registry = ProcessRegistry::new();
    let executor = executor(&registry);
    assert!(InterruptController::install(&registry).unwrap());
    let observed = InterruptController::observed();

    let handles: Vec<_> = (0..2)
        .map(|_| executor.spawn("sleep 30", RunOptions::new()).unwrap())
        .collect();
    wait_for_jobs(&registry, 2);

    let start = Instant::now();
    raise(Signal::SIGINT).unwrap();

    for handle in handles {
        let result = handle.join().unwrap().unwrap();
        assert_eq!(result.outcome, Outcome::Interrupted);
    }
    assert!(start.elapsed() < Duration::from_secs(3));
    assert!(registry.is_empty());
    assert_eq!(InterruptController::observed(), observed + 1);

    assert!(InterruptController::remove().unwrap());
}

#[test]
#[serial]
fn test_trigger_without_signal() {
    let registry = ProcessRegistry::new();
    let executor = executor(&registry);
    assert!(InterruptController::install(&registry).unwrap());

    let handle = executor.spawn("sleep 30", RunOptions::new()).unwrap();
    wait_for_jobs(&registry, 1);
    InterruptController::trigger();

    let result = handle.join().unwrap().unwrap();
    assert_eq!(result.outcome, Outcome::Interrupted);
    assert!(InterruptController::remove().unwrap());
}

#[test]
#[serial]
fn test_rejects_zero_poll_interval() {
    let registry = ProcessRegistry::new();
    assert!(InterruptController::install_with(&registry, Duration::ZERO).is_err());
    assert!(!InterruptController::is_installed());
}

/*!
 * Stdin Feeding Tests
 */

use cmdjob::{ExecConfig, Executor, RunOptions};
use proptest::prelude::*;

fn executor() -> Executor {
    Executor::new(ExecConfig::responsive()).unwrap()
}

#[test]
fn test_payload_larger_than_chunk_round_trips_through_cat() {
    let payload: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();
    let result = executor()
        .run("cat", RunOptions::new().with_stdin(payload.clone()))
        .unwrap();

    assert_eq!(result.exit_status, Some(0));
    assert_eq!(result.stdout.len(), payload.len());
    assert!(result.stdout == payload);
}

#[test]
fn test_stdin_is_closed_after_payload() {
    // wc only prints once it sees end of input
    let result = executor()
        .run("wc -c", RunOptions::new().with_stdin(vec![b'x'; 5000]))
        .unwrap();
    assert_eq!(result.stdout_str().trim(), "5000");
}

#[test]
fn test_child_ignoring_stdin_does_not_hang() {
    let result = executor()
        .run("true", RunOptions::new().with_stdin(vec![0u8; 1 << 20]))
        .unwrap();
    assert_eq!(result.exit_status, Some(0));
    assert!(result.stream_errors.is_empty());
}

#[test]
fn test_no_payload_means_empty_stdin() {
    let result = executor().run("cat", RunOptions::new()).unwrap();
    assert_eq!(result.exit_status, Some(0));
    assert!(result.stdout.is_empty());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_cat_echoes_payload(payload in prop::collection::vec(any::<u8>(), 0..4096)) {
        let result = executor()
            .run("cat", RunOptions::new().with_stdin(payload.clone()).silent())
            .unwrap();
        prop_assert_eq!(result.exit_status, Some(0));
        prop_assert_eq!(result.stdout, payload);
    }
}

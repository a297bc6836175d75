/*!
 * Process subsystem tests entry point
 */

#[path = "process/job_test.rs"]
mod job_test;

#[path = "process/timeout_test.rs"]
mod timeout_test;

#[path = "process/stdin_test.rs"]
mod stdin_test;

#[path = "process/tee_test.rs"]
mod tee_test;

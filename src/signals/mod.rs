/*!
 * Signals Module
 * SIGINT interception for mass cancellation of running jobs
 */

pub mod controller;
mod delivery;

pub use controller::InterruptController;

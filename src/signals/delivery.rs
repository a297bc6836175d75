/*!
 * Signal Delivery
 * Async-signal-safe side of interrupt handling
 */

use nix::libc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Set by the handler, cleared by the supervisor thread
static PENDING: AtomicBool = AtomicBool::new(false);

/// Interrupts acted upon since process start
static OBSERVED: AtomicU64 = AtomicU64::new(0);

/// Installed as the SIGINT handler; only touches an atomic
pub(super) extern "C" fn on_interrupt(_signal: libc::c_int) {
    PENDING.store(true, Ordering::SeqCst);
}

pub(super) fn mark_pending() {
    PENDING.store(true, Ordering::SeqCst);
}

/// Consume a pending interrupt, if any
pub(super) fn take_pending() -> bool {
    if PENDING.swap(false, Ordering::SeqCst) {
        OBSERVED.fetch_add(1, Ordering::Relaxed);
        true
    } else {
        false
    }
}

pub(super) fn clear_pending() {
    PENDING.store(false, Ordering::SeqCst);
}

pub(super) fn observed() -> u64 {
    OBSERVED.load(Ordering::Relaxed)
}

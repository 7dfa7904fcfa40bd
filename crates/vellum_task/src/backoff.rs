//! Escalating wait backoff.
//!
//! Every busy-wait in this crate shares the same ladder: the first few polls
//! return immediately, then the CPU relax hint, then an OS yield, and for
//! the sleepy variant a real sleep once the wait is clearly long.

use std::hint;
use std::thread;
use std::time::Duration;

/// Backoff for short critical sections: spin, relax, then yield.
pub fn yielding_backoff(poll: u64) {
    if poll < 8 {
        return;
    }

    if poll < 16 {
        hint::spin_loop();
        return;
    }

    thread::yield_now();
}

/// Backoff for potentially long waits: spin, relax, yield, then sleep.
pub fn sleepy_backoff(poll: u64, sleep: Duration) {
    if poll < 8 {
        return;
    }

    if poll < 16 {
        hint::spin_loop();
        return;
    }

    if poll <= 64 {
        thread::yield_now();
        return;
    }

    thread::sleep(sleep);
}

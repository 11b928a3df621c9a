//! Blocking pauses between write attempts.
//!
//! Retry loops pause through a [`Sleeper`] instead of calling
//! [`std::thread::sleep`] directly, so tests can swap in [`NoopSleeper`] or a
//! recording closure without changing the loop itself.

use std::time::Duration;

/// Performs the pause between two attempts.
pub trait Sleeper: Send + Sync {
    /// Blocks the current thread for `duration`.
    fn sleep(&self, duration: Duration);
}

/// Sleeps on the calling thread. Zero durations return immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// Never pauses.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSleeper;

impl Sleeper for NoopSleeper {
    fn sleep(&self, _duration: Duration) {}
}

impl<F> Sleeper for F
where
    F: Fn(Duration) + Send + Sync,
{
    fn sleep(&self, duration: Duration) {
        self(duration)
    }
}

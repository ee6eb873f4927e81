//! Monotonic time sources for the stream clock.
//!
//! The interpolator needs exactly one thing from its environment: a
//! monotonic microsecond counter. [`SystemClock`] reads the OS monotonic
//! clock; [`ManualClock`] is a hand-advanced clock for tests and offline
//! simulation.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

/// A monotonic source of microsecond timestamps.
///
/// Implementations must be non-decreasing. The interpolator treats a
/// backwards step as a programmer error and clamps the delta to zero.
pub trait MonotonicClock {
    /// Current time in microseconds. The origin is arbitrary but must be
    /// fixed for the lifetime of the clock.
    fn now_usecs(&self) -> i64;
}

/// Monotonic wall clock backed by [`std::time::Instant`].
///
/// Timestamps are measured from the first use in the process, so values
/// start near zero and stay comfortably inside `i64` range.
#[derive(Copy, Clone, Debug, Default)]
pub struct SystemClock;

static PROCESS_EPOCH: OnceLock<Instant> = OnceLock::new();

impl MonotonicClock for SystemClock {
    fn now_usecs(&self) -> i64 {
        PROCESS_EPOCH.get_or_init(Instant::now).elapsed().as_micros() as i64
    }
}

/// Hand-advanced clock for tests and simulation.
///
/// The current value lives in a shared atomic so a clone can be handed to
/// the stream clock while the test keeps advancing time. Uses relaxed
/// ordering because readers only need eventual consistency -- the value
/// is advanced and read from the controlling thread.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    /// Create a clock pinned at time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a clock pinned at `start` microseconds.
    pub fn starting_at(start: i64) -> Self {
        Self {
            now: Arc::new(AtomicI64::new(start)),
        }
    }

    /// Advance the clock by `dt` microseconds.
    pub fn advance(&self, dt: i64) {
        self.now.fetch_add(dt, Ordering::Relaxed);
    }

    /// Jump the clock to an absolute time.
    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::Relaxed);
    }
}

impl MonotonicClock for ManualClock {
    fn now_usecs(&self) -> i64 {
        self.now.load(Ordering::Relaxed)
    }
}

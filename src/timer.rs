//! Monotonic nanosecond clock used to time each pass.
//!
//! Readings come from `std::time::Instant`, which is backed by the OS
//! monotonic clock (`CLOCK_MONOTONIC` on Linux, `QueryPerformanceCounter` on
//! Windows) and never goes backwards on wall-clock adjustment.

use std::time::{Duration, Instant};

/// An opaque reading of the monotonic clock.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp(Instant);

/// Zero-sized handle to the monotonic clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct Timer;

impl Timer {
    #[inline]
    pub fn now(&self) -> Timestamp {
        Timestamp(Instant::now())
    }

    /// Time between two readings. Saturates to zero if `end` precedes `start`.
    #[inline]
    pub fn elapsed(&self, start: Timestamp, end: Timestamp) -> Duration {
        end.0.saturating_duration_since(start.0)
    }
}

/// Average nanoseconds per operation.
///
/// Defined as `0.0` when no operation ran, so an empty pass never yields NaN.
pub fn per_op_ns(elapsed: Duration, ops: usize) -> f64 {
    if ops == 0 {
        return 0.0;
    }
    elapsed.as_nanos() as f64 / ops as f64
}

//! Clock abstraction for deterministic testing.
//!
//! Decouples the session from system time. Production uses [`SystemClock`];
//! tests drive a hand-rolled clock forward to exercise timers without
//! sleeping. Timer deadlines use milliseconds; message timestamps use
//! nanoseconds. The two scales are never unified.

use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Source of the two time scales the session consumes.
///
/// # Invariants
///
/// - `time_ms()` MUST be monotonic: subsequent calls return values >=
///   previous calls within one session.
/// - `time_ns()` stamps `sendingTimeEpoch` and the canonical request
///   timestamps; it is wall time in nanoseconds since the Unix epoch.
pub trait Clock {
    /// Monotonic time in milliseconds, used for timer deadlines.
    fn time_ms(&self) -> i64;

    /// Wall time in nanoseconds since the Unix epoch, used for message
    /// timestamps.
    fn time_ns(&self) -> i64;
}

/// Production clock backed by [`Instant`] and [`SystemTime`].
#[derive(Debug, Clone)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    /// Create a clock whose millisecond scale starts at zero now.
    #[must_use]
    pub fn new() -> Self {
        Self { start: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn time_ms(&self) -> i64 {
        self.start.elapsed().as_millis() as i64
    }

    fn time_ns(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |since_epoch| since_epoch.as_nanos() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let first = clock.time_ms();
        let second = clock.time_ms();
        assert!(second >= first);
    }

    #[test]
    fn nanosecond_scale_is_epoch_based() {
        let clock = SystemClock::new();
        // Well past 2020 in nanoseconds
        assert!(clock.time_ns() > 1_577_836_800_000_000_000);
    }
}

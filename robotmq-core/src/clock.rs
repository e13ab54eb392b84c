//! Broker clock
//!
//! Timestamps are seconds since the clock's start instant, measured on the
//! monotonic clock. `reset` moves the start instant so that the current
//! moment reads as the elapsed time since a caller-supplied wall-clock
//! reference.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Microseconds since the Unix epoch on the wall clock.
pub fn system_clock_us() -> i64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_micros() as i64,
        Err(e) => -(e.duration().as_micros() as i64),
    }
}

/// Microseconds on the process monotonic clock.
///
/// Only differences between two readings are meaningful.
pub fn steady_clock_us() -> i64 {
    process_origin().elapsed().as_micros() as i64
}

fn process_origin() -> Instant {
    use std::sync::OnceLock;
    static ORIGIN: OnceLock<Instant> = OnceLock::new();
    *ORIGIN.get_or_init(Instant::now)
}

/// Monotonic clock with a movable start instant.
#[derive(Debug)]
pub struct Clock {
    origin: Instant,
    /// Start instant, in microseconds after `origin`. May be negative.
    start_us: AtomicI64,
}

impl Clock {
    /// New clock whose start instant is now.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            start_us: AtomicI64::new(0),
        }
    }

    fn elapsed_us(&self) -> i64 {
        self.origin.elapsed().as_micros() as i64
    }

    /// Seconds since the start instant.
    pub fn timestamp(&self) -> f64 {
        let us = self.elapsed_us() - self.start_us.load(Ordering::Acquire);
        us as f64 / 1e6
    }

    /// Re-anchor the start instant to a wall-clock reference.
    ///
    /// After the call, `timestamp()` reads `(now_wall - reference_unix_us) / 1e6`.
    /// Entries already stored keep their old timestamps.
    pub fn reset(&self, reference_unix_us: i64) {
        let start = self.elapsed_us() + (reference_unix_us - system_clock_us());
        self.start_us.store(start, Ordering::Release);
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_timestamp_is_monotonic() {
        let clock = Clock::new();
        let a = clock.timestamp();
        std::thread::sleep(Duration::from_millis(5));
        let b = clock.timestamp();
        assert!(b > a);
        assert!(a >= 0.0);
    }

    #[test]
    fn test_reset_to_past_reference() {
        let clock = Clock::new();
        clock.reset(system_clock_us() - 3_000_000);
        let ts = clock.timestamp();
        assert!((ts - 3.0).abs() < 0.1, "timestamp {ts}");
    }

    #[test]
    fn test_reset_to_future_reference_reads_negative() {
        let clock = Clock::new();
        clock.reset(system_clock_us() + 2_000_000);
        assert!(clock.timestamp() < -1.5);
    }

    #[test]
    fn test_steady_clock_advances() {
        let a = steady_clock_us();
        std::thread::sleep(Duration::from_millis(2));
        assert!(steady_clock_us() - a >= 2_000);
    }
}

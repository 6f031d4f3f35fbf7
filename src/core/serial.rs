//! Wager serial generation.
//!
//! Serials are `millis * 1000 + random(0..1000)`, clamped to stay strictly
//! above the last serial handed out by this process.

use chrono::{DateTime, Utc};
use rand::Rng;
use std::sync::atomic::{AtomicI64, Ordering};

/// Issues increasing, collision-resistant wager serials.
#[derive(Debug, Default)]
pub struct SerialGenerator {
    last: AtomicI64,
}

impl SerialGenerator {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last: AtomicI64::new(0),
        }
    }

    /// Next serial for a wager confirmed at `now`.
    pub fn next(&self, now: DateTime<Utc>) -> i64 {
        let suffix: i64 = rand::rng().random_range(0..1000);
        let candidate = now.timestamp_millis() * 1000 + suffix;

        let mut previous = self.last.load(Ordering::Relaxed);
        loop {
            let serial = candidate.max(previous + 1);
            match self.last.compare_exchange_weak(
                previous,
                serial,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return serial,
                Err(current) => previous = current,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serials_increase_within_same_millisecond() {
        let generator = SerialGenerator::new();
        let now = Utc::now();
        let mut last = 0;
        for _ in 0..500 {
            let serial = generator.next(now);
            assert!(serial > last);
            last = serial;
        }
    }

    #[test]
    fn test_serial_is_time_derived() {
        let generator = SerialGenerator::new();
        let now = Utc::now();
        let serial = generator.next(now);
        assert_eq!(serial / 1000, now.timestamp_millis());
    }
}

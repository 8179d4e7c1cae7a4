//! Time source abstraction for deterministic testing.
//!
//! This module provides a `TimeSource` trait that abstracts over the clock,
//! allowing the auth service to stamp and check tokens against real system
//! time in production and a fixed time in tests.

use chrono::{DateTime, Utc};

/// Abstraction over the current time.
pub trait TimeSource: Send + Sync {
    /// Get the current UTC time.
    fn now(&self) -> DateTime<Utc>;
}

/// Real time source using the system clock.
///
/// This is the default implementation used in production.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Time source that always returns the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedTimeSource(pub DateTime<Utc>);

impl TimeSource for FixedTimeSource {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_system_time_source() {
        let source = SystemTimeSource;
        let t1 = source.now();
        let t2 = source.now();

        // Time should be reasonable (after 2020)
        assert!(t1.timestamp() > 1_577_836_800); // 2020-01-01 00:00:00 UTC

        // Time should not go backwards
        assert!(t2 >= t1);
    }

    #[test]
    fn test_fixed_time_source() {
        let instant = Utc.with_ymd_and_hms(2024, 4, 1, 12, 0, 0).unwrap();
        let source = FixedTimeSource(instant);
        assert_eq!(source.now(), instant);
        assert_eq!(source.now(), source.now());
    }
}

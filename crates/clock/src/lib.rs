//! Clock and TTL primitives.
//!
//! Every cache in the workspace asks a [`Clock`] for "now" instead of reading
//! the system time directly, so that tests can drive expiry with a
//! [`ManualClock`] (behind the `mock` feature) rather than sleeping.

#[cfg(any(test, feature = "mock"))]
mod manual;

#[cfg(any(test, feature = "mock"))]
pub use crate::manual::ManualClock;
use std::fmt::Debug;
use std::sync::Arc;
use time::{Duration, OffsetDateTime};

pub type ClockHandle = Arc<dyn Clock>;

/// Source of the current time.
pub trait Clock: Debug + Send + Sync {
    fn now(&self) -> OffsetDateTime;

    /// Time elapsed since `since`. Negative when `since` lies in the future.
    fn age(&self, since: OffsetDateTime) -> Duration {
        self.now() - since
    }

    /// Whether `since` is no older than `ttl`. The bound is inclusive: an
    /// entry aged exactly `ttl` is still within it.
    fn is_within(&self, since: OffsetDateTime, ttl: Duration) -> bool {
        self.age(since) <= ttl
    }
}

/// The wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl SystemClock {
    pub fn handle() -> ClockHandle {
        Arc::new(Self)
    }
}

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Converts a configuration-friendly [`std::time::Duration`] into the signed
/// [`time::Duration`] used for age comparisons, saturating on overflow.
pub fn ttl(duration: std::time::Duration) -> Duration {
    Duration::try_from(duration).unwrap_or(Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Duration::ZERO, true)]
    #[case(Duration::minutes(9), true)]
    #[case(Duration::minutes(10), true)]
    #[case(Duration::minutes(10) + Duration::nanoseconds(1), false)]
    #[case(Duration::hours(1), false)]
    fn test_is_within_inclusive(#[case] elapsed: Duration, #[case] expected: bool) {
        let clock = ManualClock::default();
        let since = clock.now();
        clock.advance(elapsed);
        assert_eq!(clock.is_within(since, Duration::minutes(10)), expected);
    }

    #[test]
    fn test_age_of_future_timestamp_is_negative() {
        let clock = ManualClock::default();
        let future = clock.now() + Duration::seconds(30);
        assert!(clock.age(future).is_negative());
        assert!(clock.is_within(future, Duration::ZERO));
    }

    #[test]
    fn test_system_clock_moves_forward() {
        let clock = SystemClock;
        let first = clock.now();
        assert!(clock.now() >= first);
    }

    #[rstest]
    #[case(std::time::Duration::from_secs(600), Duration::minutes(10))]
    #[case(std::time::Duration::ZERO, Duration::ZERO)]
    #[case(std::time::Duration::MAX, Duration::MAX)]
    fn test_ttl_conversion(#[case] input: std::time::Duration, #[case] expected: Duration) {
        assert_eq!(ttl(input), expected);
    }
}

//! Time source and time-window predicates.
//!
//! Business predicates never read the wall clock directly. The current instant
//! is supplied by a [`Clock`], so tests can pin time to an exact boundary.

use chrono::{DateTime, TimeDelta, Utc};

/// Supplies "now" for time-window checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at a single instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock {
    instant: DateTime<Utc>,
}

impl FixedClock {
    pub fn new(instant: DateTime<Utc>) -> Self {
        Self { instant }
    }

    /// Returns a clock `delta` later than this one.
    #[must_use]
    pub fn advanced_by(self, delta: TimeDelta) -> Self {
        Self {
            instant: self.instant + delta,
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.instant
    }
}

// ============================================================================
// Window predicates
// ============================================================================

/// Returns whether `t` lies strictly less than `window` before `now`.
///
/// Exactly `window` old is outside. An absent timestamp, or one later than
/// `now`, is outside every window.
pub fn within_window(t: Option<DateTime<Utc>>, now: DateTime<Utc>, window: TimeDelta) -> bool {
    match t {
        Some(t) if t <= now => now.signed_duration_since(t) < window,
        _ => false,
    }
}

/// Returns the number of whole days elapsed since `t`.
///
/// `None` when `t` is absent or later than `now`.
pub fn days_since(t: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Option<i64> {
    match t {
        Some(t) if t <= now => Some(now.signed_duration_since(t).num_days()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use test_case::test_case;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 8, 10, 0, 0).unwrap()
    }

    #[test_case(TimeDelta::minutes(5) => true; "five minutes ago")]
    #[test_case(TimeDelta::seconds(14 * 60 + 59) => true; "one second inside")]
    #[test_case(TimeDelta::minutes(15) => false; "exactly at the boundary")]
    #[test_case(TimeDelta::minutes(16) => false; "expired")]
    #[test_case(TimeDelta::zero() => true; "just now")]
    fn mfa_window(age: TimeDelta) -> bool {
        within_window(Some(now() - age), now(), TimeDelta::minutes(15))
    }

    #[test]
    fn absent_and_future_timestamps_are_outside() {
        assert!(!within_window(None, now(), TimeDelta::minutes(15)));
        assert!(!within_window(
            Some(now() + TimeDelta::seconds(1)),
            now(),
            TimeDelta::minutes(15)
        ));
    }

    #[test]
    fn days_since_counts_whole_days() {
        assert_eq!(days_since(Some(now() - TimeDelta::days(30)), now()), Some(30));
        assert_eq!(
            days_since(Some(now() - TimeDelta::days(90) - TimeDelta::hours(23)), now()),
            Some(90)
        );
        assert_eq!(days_since(None, now()), None);
        assert_eq!(days_since(Some(now() + TimeDelta::days(1)), now()), None);
    }

    #[test]
    fn fixed_clock_is_stable() {
        let clock = FixedClock::new(now());
        assert_eq!(clock.now(), clock.now());
        assert_eq!(
            clock.advanced_by(TimeDelta::minutes(1)).now(),
            now() + TimeDelta::minutes(1)
        );
    }
}

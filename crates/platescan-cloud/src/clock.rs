//! Wall-clock sources for token expiry.
//!
//! The station has no real-time clock; time comes from network sync and is
//! meaningless until that has happened. A [`Clock`] therefore answers
//! `None` while time is unknown.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};

/// Source of the current wall-clock time.
pub trait Clock {
    /// Current time, or `None` if the clock is not synchronized.
    fn now(&self) -> Option<DateTime<Utc>>;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Option<DateTime<Utc>> {
        (**self).now()
    }
}

/// Earliest instant accepted as a synchronized time (2023-01-01T00:00:00Z).
pub fn sync_threshold() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// System clock, treated as unsynchronized before 2023.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Option<DateTime<Utc>> {
        let now = Utc::now();
        (now >= sync_threshold()).then_some(now)
    }
}

/// Manually driven clock.
///
/// Clones share the same time, so a test can keep one copy and advance it
/// while another is owned by the token manager.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<Mutex<Option<DateTime<Utc>>>>,
}

impl ManualClock {
    /// A clock that is not synchronized yet.
    pub fn unsynchronized() -> Self {
        Self::default()
    }

    /// A clock reading `at`.
    pub fn at(at: DateTime<Utc>) -> Self {
        let clock = Self::default();
        clock.set(Some(at));
        clock
    }

    pub fn set(&self, at: Option<DateTime<Utc>>) {
        *self.now.lock().unwrap_or_else(|p| p.into_inner()) = at;
    }

    /// Move the clock forward. Does nothing while unsynchronized.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(current) = now.as_mut() {
            *current += by;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Option<DateTime<Utc>> {
        *self.now.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_synchronized_on_host() {
        assert!(SystemClock.now().is_some());
    }

    #[test]
    fn test_sync_threshold() {
        assert_eq!(sync_threshold().timestamp(), 1_672_531_200);
    }

    #[test]
    fn test_manual_clock_shared_between_clones() {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let clock = ManualClock::at(start);
        let other = clock.clone();

        clock.advance(Duration::minutes(61));
        assert_eq!(other.now(), Some(start + Duration::minutes(61)));
    }

    #[test]
    fn test_unsynchronized_clock_stays_unset() {
        let clock = ManualClock::unsynchronized();
        clock.advance(Duration::minutes(5));
        assert_eq!(clock.now(), None);
    }
}

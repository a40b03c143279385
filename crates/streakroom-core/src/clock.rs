//! Clock abstraction and calendar-day boundaries.
//!
//! All "same day" decisions are made in a single reference timezone, a fixed
//! UTC offset taken from configuration. Timestamps are stored in UTC.

use std::sync::Mutex;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Offset, Utc};

use crate::error::ValidationError;

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests and replays.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = now;
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut guard) = self.now.lock() {
            *guard += by;
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// The reference timezone used to cut days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayBoundary {
    offset: FixedOffset,
}

impl Default for DayBoundary {
    fn default() -> Self {
        Self::utc()
    }
}

impl DayBoundary {
    pub fn utc() -> Self {
        Self { offset: Utc.fix() }
    }

    /// Build from a UTC offset in minutes (e.g. `480` for UTC+8).
    ///
    /// # Errors
    /// Returns an error if the offset is not strictly within ±24h.
    pub fn from_offset_minutes(minutes: i32) -> Result<Self, ValidationError> {
        minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .map(|offset| Self { offset })
            .ok_or_else(|| ValidationError::InvalidValue {
                field: "utc_offset_minutes".into(),
                message: format!("{minutes} is not a valid UTC offset"),
            })
    }

    pub fn offset_minutes(&self) -> i32 {
        self.offset.local_minus_utc() / 60
    }

    /// Calendar date of `at` in the reference timezone.
    pub fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.offset).date_naive()
    }

    /// Storage key for the calendar day containing `at` (`YYYY-MM-DD`).
    pub fn day_key(&self, at: DateTime<Utc>) -> String {
        self.local_date(at).format("%Y-%m-%d").to_string()
    }

    /// True iff `last_claimed_at` falls on the same calendar date as `now`.
    ///
    /// A missing timestamp means the user never claimed.
    pub fn has_claimed_today(
        &self,
        last_claimed_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> bool {
        match last_claimed_at {
            Some(last) => self.local_date(last) == self.local_date(now),
            None => false,
        }
    }

    /// Start of the next calendar day after `now`, in UTC.
    pub fn next_day_start(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let tomorrow = self.local_date(now).succ_opt()?;
        let local = tomorrow.and_hms_opt(0, 0, 0)?.and_local_timezone(self.offset);
        local.single().map(|t| t.with_timezone(&Utc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn never_claimed_is_not_claimed_today() {
        let b = DayBoundary::utc();
        assert!(!b.has_claimed_today(None, at(2026, 3, 1, 12, 0)));
    }

    #[test]
    fn same_utc_date_counts_as_claimed() {
        let b = DayBoundary::utc();
        assert!(b.has_claimed_today(Some(at(2026, 3, 1, 0, 0)), at(2026, 3, 1, 23, 59)));
        assert!(!b.has_claimed_today(Some(at(2026, 3, 1, 23, 59)), at(2026, 3, 2, 0, 0)));
    }

    #[test]
    fn offset_moves_the_boundary() {
        // UTC+8: 2026-03-01T15:30Z is already 2026-03-01 23:30 local,
        // 16:30Z is 2026-03-02 00:30 local.
        let b = DayBoundary::from_offset_minutes(480).unwrap();
        assert!(!b.has_claimed_today(Some(at(2026, 3, 1, 15, 30)), at(2026, 3, 1, 16, 30)));

        // Same pair is one UTC day.
        assert!(DayBoundary::utc()
            .has_claimed_today(Some(at(2026, 3, 1, 15, 30)), at(2026, 3, 1, 16, 30)));
    }

    #[test]
    fn day_key_uses_reference_timezone() {
        let b = DayBoundary::from_offset_minutes(-300).unwrap();
        assert_eq!(b.day_key(at(2026, 1, 1, 3, 0)), "2025-12-31");
        assert_eq!(DayBoundary::utc().day_key(at(2026, 1, 1, 3, 0)), "2026-01-01");
    }

    #[test]
    fn invalid_offset_rejected() {
        assert!(DayBoundary::from_offset_minutes(24 * 60).is_err());
        assert!(DayBoundary::from_offset_minutes(-24 * 60).is_err());
        assert_eq!(DayBoundary::from_offset_minutes(-90).unwrap().offset_minutes(), -90);
    }

    #[test]
    fn next_day_start_is_local_midnight() {
        let b = DayBoundary::from_offset_minutes(60).unwrap();
        let next = b.next_day_start(at(2026, 3, 1, 12, 0)).unwrap();
        assert_eq!(next, at(2026, 3, 1, 23, 0));
    }

    #[test]
    fn fixed_clock_advances() {
        let clock = FixedClock::new(at(2026, 3, 1, 8, 0));
        clock.advance(Duration::days(1));
        assert_eq!(clock.now(), at(2026, 3, 2, 8, 0));
        clock.set(at(2030, 1, 1, 0, 0));
        assert_eq!(clock.now(), at(2030, 1, 1, 0, 0));
    }

    proptest! {
        #[test]
        fn claimed_today_iff_same_local_date(
            last in 0i64..4_000_000_000,
            now in 0i64..4_000_000_000,
            offset in -1439i32..1440,
        ) {
            let b = DayBoundary::from_offset_minutes(offset).unwrap();
            let last = Utc.timestamp_opt(last, 0).unwrap();
            let now = Utc.timestamp_opt(now, 0).unwrap();
            prop_assert_eq!(
                b.has_claimed_today(Some(last), now),
                b.day_key(last) == b.day_key(now)
            );
            prop_assert!(!b.has_claimed_today(None, now));
        }

        #[test]
        fn a_full_day_later_is_never_today(start in 0i64..4_000_000_000, offset in -1439i32..1440) {
            let b = DayBoundary::from_offset_minutes(offset).unwrap();
            let t = Utc.timestamp_opt(start, 0).unwrap();
            prop_assert!(!b.has_claimed_today(Some(t), t + Duration::hours(24)));
        }
    }
}

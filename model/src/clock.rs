//! The fixed notion of "now" used for a single run.

use chrono::{DateTime, Duration, FixedOffset, Local, NaiveDate, TimeZone};

/// A frozen point in time.
///
/// Every date decision in a run (what counts as today, which calendar day an episode airs on) is
/// made relative to one [`Clock`], so that a run is internally consistent even if it straddles
/// midnight.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Clock {
    now: DateTime<FixedOffset>,
}

impl Clock {
    /// The current local time.
    pub fn now() -> Self {
        Self {
            now: Local::now().fixed_offset(),
        }
    }

    /// A clock frozen at `now`.
    pub fn at(now: DateTime<FixedOffset>) -> Self {
        Self { now }
    }

    /// A clock frozen at noon UTC on `date`.
    pub fn on(date: NaiveDate) -> Self {
        let now = date.and_hms_opt(12, 0, 0).unwrap_or_default().and_utc();
        Self {
            now: now.fixed_offset(),
        }
    }

    pub fn datetime(&self) -> DateTime<FixedOffset> {
        self.now
    }

    pub fn today(&self) -> NaiveDate {
        self.now.date_naive()
    }

    pub fn tomorrow(&self) -> NaiveDate {
        self.today() + Duration::days(1)
    }

    /// The calendar date, in this clock's time zone, of a Unix timestamp.
    pub fn date_of(&self, timestamp: i64) -> Option<NaiveDate> {
        self.now
            .offset()
            .timestamp_opt(timestamp, 0)
            .single()
            .map(|dt| dt.date_naive())
    }

    /// Days from today until `date` (negative if `date` is in the past).
    pub fn days_until(&self, date: NaiveDate) -> i64 {
        (date - self.today()).num_days()
    }

    /// Days from `date` until today (negative if `date` is in the future).
    pub fn days_since(&self, date: NaiveDate) -> i64 {
        (self.today() - date).num_days()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_date_of_respects_offset() {
        let tokyo = FixedOffset::east_opt(9 * 3600).unwrap();
        let clock = Clock::at(tokyo.with_ymd_and_hms(2025, 4, 10, 8, 0, 0).unwrap());

        // 2025-04-10T16:30:00Z is already the 11th in Tokyo.
        let ts = chrono::Utc
            .with_ymd_and_hms(2025, 4, 10, 16, 30, 0)
            .unwrap()
            .timestamp();
        assert_eq!(
            clock.date_of(ts),
            NaiveDate::from_ymd_opt(2025, 4, 11)
        );
    }

    #[test]
    fn test_relative_days() {
        let clock = Clock::on(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());
        assert_eq!(clock.tomorrow(), NaiveDate::from_ymd_opt(2025, 3, 2).unwrap());
        assert_eq!(
            clock.days_until(NaiveDate::from_ymd_opt(2025, 3, 8).unwrap()),
            7
        );
        assert_eq!(
            clock.days_since(NaiveDate::from_ymd_opt(2025, 2, 27).unwrap()),
            2
        );
    }
}

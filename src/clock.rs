use std::sync::Mutex;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Offset, Utc};

/// Source of "now" and of the resort's calendar day.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn today(&self) -> NaiveDate;
}

/// Wall clock. `today` is taken in the resort's fixed UTC offset.
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn utc() -> Self {
        Self::new(Utc.fix())
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.offset).date_naive()
    }
}

/// Manually driven clock for tests and replays.
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    /// Clock pinned to noon UTC on `day`.
    pub fn at_date(day: NaiveDate) -> Self {
        Self::new(noon(day))
    }

    pub fn set_date(&self, day: NaiveDate) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = noon(day);
    }

    pub fn advance_days(&self, days: i64) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += Duration::days(days);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

fn noon(day: NaiveDate) -> DateTime<Utc> {
    day.and_hms_opt(12, 0, 0)
        .expect("noon is a valid time")
        .and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_advances_by_days() {
        let day: NaiveDate = "2024-06-01".parse().unwrap();
        let clock = FixedClock::at_date(day);
        assert_eq!(clock.today(), day);
        clock.advance_days(3);
        assert_eq!(clock.today(), "2024-06-04".parse::<NaiveDate>().unwrap());
        clock.set_date(day);
        assert_eq!(clock.today(), day);
    }

    #[test]
    fn system_clock_offset_shifts_today() {
        let east = SystemClock::new(FixedOffset::east_opt(14 * 3600).unwrap());
        let west = SystemClock::new(FixedOffset::west_opt(12 * 3600).unwrap());
        // 26 hours apart: the east clock is always one or two days ahead.
        let gap = (east.today() - west.today()).num_days();
        assert!((1..=2).contains(&gap), "gap was {gap}");
    }
}

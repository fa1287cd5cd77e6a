//! Calendar helpers shared by the aggregation, feature and fetch stages.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};
use serde::Serialize;
use std::fmt;

/// Number of hourly rows in one forecast day.
pub const HORIZON_HOURS: usize = 24;

/// Grouping key for historical observations: calendar month, day of month and hour of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct AggregateKey {
    pub month: u32,
    pub day: u32,
    pub hour: u32,
}

impl AggregateKey {
    pub fn new(month: u32, day: u32, hour: u32) -> Self {
        Self { month, day, hour }
    }

    pub fn from_datetime(datetime: &NaiveDateTime) -> Self {
        Self {
            month: datetime.month(),
            day: datetime.day(),
            hour: datetime.hour(),
        }
    }

    /// The (month, hour) pair used when the exact day has no history.
    pub fn relaxed(&self) -> (u32, u32) {
        (self.month, self.hour)
    }
}

impl fmt::Display for AggregateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}-{:02} {:02}:00", self.month, self.day, self.hour)
    }
}

/// Inclusive start/end dates of an anniversary window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

pub(crate) fn days_in_month(year: i32, month: u32) -> Option<u32> {
    if !(1..=12).contains(&month) {
        return None;
    }
    let (next_month_year, next_month) = if month == 12 {
        (year.checked_add(1)?, 1)
    } else {
        (year, month + 1)
    };
    let first_day_of_next_month = NaiveDate::from_ymd_opt(next_month_year, next_month, 1)?;
    let last_day_of_current_month = first_day_of_next_month - Duration::days(1);
    Some(last_day_of_current_month.day())
}

/// The same month/day as `date` in `year`. Feb 29 falls back to Feb 28 in non-leap years.
pub fn anniversary(date: NaiveDate, year: i32) -> Option<NaiveDate> {
    let day = date.day().min(days_in_month(year, date.month())?);
    NaiveDate::from_ymd_opt(year, date.month(), day)
}

/// `±window_days` around the anniversary of `date` in `year`.
pub fn anniversary_window(date: NaiveDate, year: i32, window_days: u32) -> Option<DateWindow> {
    let center = anniversary(date, year)?;
    let span = Duration::days(i64::from(window_days));
    Some(DateWindow {
        start: center.checked_sub_signed(span)?,
        end: center.checked_add_signed(span)?,
    })
}

/// The 24 hourly timestamps (00:00 .. 23:00) of `date`.
pub fn hours_of_day(date: NaiveDate) -> Vec<NaiveDateTime> {
    let midnight = date.and_time(chrono::NaiveTime::MIN);
    (0..HORIZON_HOURS as i64)
        .map(|h| midnight + Duration::hours(h))
        .collect()
}

//! Date-only helpers. Time of day never takes part in a comparison.

use chrono::{DateTime, Months, NaiveDate, Utc};

/// Both timestamps fall on the same UTC calendar day.
pub fn same_day(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    a.date_naive() == b.date_naive()
}

/// `a` falls on the same calendar day as `b` or earlier.
pub fn is_on_or_before_day(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    a.date_naive() <= b.date_naive()
}

/// Whole days from `from` to `to` (negative when `to` is earlier).
pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}

/// Shift by a number of calendar months, clamping to the last day of
/// shorter months (Jan 31 + 1 month = Feb 28/29).
pub fn add_months_clamped(date: NaiveDate, months: i32) -> Option<NaiveDate> {
    if months >= 0 {
        date.checked_add_months(Months::new(months as u32))
    } else {
        date.checked_sub_months(Months::new(months.unsigned_abs()))
    }
}

/// Midnight UTC of the given day.
pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

//! Week boundary math for the publication cycle.
//!
//! Every component that reasons about "this week" or "last week" goes through
//! these functions. A publication week is identified by its Monday (ISO date,
//! no time component).

use chrono::{Datelike, Duration, NaiveDate, Utc};

/// Monday on or before the given date. Sunday rolls back six days, any other
/// weekday rolls back `weekday - 1` days, so the result is always a Monday
/// and always `<=` the input.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    let days_back = date.weekday().num_days_from_monday() as i64;
    date - Duration::days(days_back)
}

pub fn current_week_start() -> NaiveDate {
    week_start(Utc::now().date_naive())
}

pub fn previous_week_start() -> NaiveDate {
    current_week_start() - Duration::days(7)
}

//! Database utility functions.

use chrono::{Local, NaiveDate, NaiveDateTime, SubsecRound, Utc};

/// Current UTC time at whole-second precision, the resolution of SQLite's
/// `CURRENT_TIMESTAMP`.
pub fn now() -> NaiveDateTime {
    Utc::now().naive_utc().trunc_subsecs(0)
}

/// Today's calendar date in local time.
///
/// Due dates are calendar dates, so both the overdue query and
/// `Todo::is_overdue` compare against this value.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

//! Time and timestamp helpers.
//!
//! Absolute instants (fire times, audit timestamps) are UTC [`Timestamp`]s.
//! Scene configuration (time of day, weekdays, effective windows) is
//! expressed in the hub's local wall clock as naive values.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc, Weekday};

/// UTC timestamp used for fire times, log creation and completion, etc.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Return the current local wall-clock time.
#[must_use]
pub fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Convert a local wall-clock time into an absolute instant.
///
/// Returns `None` for wall-clock times skipped by a DST transition. Ambiguous
/// times (repeated by a DST transition) resolve to the earliest instant.
#[must_use]
pub fn local_to_utc(local: NaiveDateTime) -> Option<Timestamp> {
    Local
        .from_local_datetime(&local)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Convert an absolute instant into the local wall clock.
#[must_use]
pub fn to_local(ts: Timestamp) -> NaiveDateTime {
    ts.with_timezone(&Local).naive_local()
}

/// Digit used for a weekday in repeat-date strings: `1` = Monday … `7` = Sunday.
#[must_use]
pub fn weekday_digit(weekday: Weekday) -> char {
    match weekday {
        Weekday::Mon => '1',
        Weekday::Tue => '2',
        Weekday::Wed => '3',
        Weekday::Thu => '4',
        Weekday::Fri => '5',
        Weekday::Sat => '6',
        Weekday::Sun => '7',
    }
}

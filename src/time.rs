//! Clock-time helpers.
//!
//! Every time computation in the engine goes through these functions:
//! - `"HH:MM"` strings to minutes since midnight and back
//! - combining a calendar date with a clock time
//! - shifting absolute date-times by signed minute offsets

use chrono::{Duration as ChronoDuration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use crate::error::{SchedulerError, SchedulerResult};

/// Minutes in one day.
pub const MINUTES_PER_DAY: i64 = 24 * 60;

const TIME_FORMAT: &str = "%H:%M";
const DATE_FORMAT: &str = "%Y-%m-%d";

fn parse_time(hhmm: &str) -> SchedulerResult<NaiveTime> {
    NaiveTime::parse_from_str(hhmm, TIME_FORMAT)
        .map_err(|_| SchedulerError::InvalidTimeFormat(hhmm.to_string()))
}

/// Parse `"HH:MM"` into minutes since midnight.
///
/// Fails on non-numeric input, a wrong separator or an out-of-range
/// hour/minute. Mutation paths must use this strict form.
pub fn time_to_minutes(hhmm: &str) -> SchedulerResult<u32> {
    let time = parse_time(hhmm)?;
    Ok(time.num_seconds_from_midnight() / 60)
}

/// Display-path variant of [`time_to_minutes`]: malformed input falls back
/// to midnight and is logged.
pub fn time_to_minutes_or_midnight(hhmm: &str) -> u32 {
    match time_to_minutes(hhmm) {
        Ok(minutes) => minutes,
        Err(e) => {
            tracing::warn!("{}, displaying as 00:00", e);
            0
        }
    }
}

/// Format minutes since midnight as `"HH:MM"`.
///
/// Values outside `[0, 1440)` wrap around like a clock.
pub fn minutes_to_time(minutes: i64) -> String {
    let wrapped = minutes.rem_euclid(MINUTES_PER_DAY);
    format!("{:02}:{:02}", wrapped / 60, wrapped % 60)
}

/// Shift a clock time by `delta` minutes, wrapping at midnight.
pub fn add_minutes_to_time(hhmm: &str, delta: i64) -> SchedulerResult<String> {
    let minutes = time_to_minutes(hhmm)?;
    Ok(minutes_to_time(i64::from(minutes) + delta))
}

/// Combine a calendar date with an `"HH:MM"` clock time.
pub fn combine_date_and_time(date: NaiveDate, hhmm: &str) -> SchedulerResult<NaiveDateTime> {
    Ok(date.and_time(parse_time(hhmm)?))
}

/// Extract the `"HH:MM"` clock time of a date-time.
pub fn extract_time(datetime: &NaiveDateTime) -> String {
    datetime.format(TIME_FORMAT).to_string()
}

/// Minutes since midnight of a date-time.
pub fn minutes_of_day(datetime: &NaiveDateTime) -> u32 {
    datetime.time().num_seconds_from_midnight() / 60
}

/// Shift an absolute date-time by a signed number of minutes.
pub fn add_minutes(datetime: NaiveDateTime, delta: i64) -> NaiveDateTime {
    datetime + ChronoDuration::minutes(delta)
}

/// Signed number of whole minutes from `from` to `to`.
pub fn minutes_between(from: &NaiveDateTime, to: &NaiveDateTime) -> i64 {
    (*to - *from).num_minutes()
}

/// Parse a `"YYYY-MM-DD"` calendar date.
pub fn parse_date(value: &str) -> SchedulerResult<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|_| SchedulerError::InvalidDateFormat(value.to_string()))
}

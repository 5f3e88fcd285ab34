//! Conversions between engine temporal units and host date/time values.
//!
//! Epoch offsets are split into whole seconds and a sub-second remainder with
//! floor semantics, so pre-1970 instants keep full precision.

use time::macros::format_description;
use time::{Date, Duration, OffsetDateTime, PrimitiveDateTime, UtcOffset};

use crate::error::{Error, Result};

/// Julian day number of 1970-01-01.
pub const UNIX_EPOCH_JULIAN_DAY: i32 = 2_440_588;

const MICROS_PER_DAY: i128 = 86_400_000_000;
const DAYS_PER_MONTH: i128 = 30;

fn out_of_range(what: &str, value: impl std::fmt::Display) -> Error {
    Error::Conversion(format!("{what} {value} is out of range"))
}

/// Date `days` after the Unix epoch.
pub fn date_from_days(days: i32) -> Result<Date> {
    days.checked_add(UNIX_EPOCH_JULIAN_DAY)
        .and_then(|julian| Date::from_julian_day(julian).ok())
        .ok_or_else(|| out_of_range("date offset", days))
}

/// Days between the Unix epoch and `date`.
pub fn days_from_date(date: Date) -> i32 {
    date.to_julian_day() - UNIX_EPOCH_JULIAN_DAY
}

fn from_parts(secs: i64, nanos: i64) -> Result<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp(secs)
        .ok()
        .and_then(|base| base.checked_add(Duration::nanoseconds(nanos)))
        .ok_or_else(|| out_of_range("timestamp seconds", secs))
}

/// Seconds since the epoch as a UTC instant.
pub fn timestamp_from_secs(secs: i64) -> Result<OffsetDateTime> {
    from_parts(secs, 0)
}

/// Milliseconds since the epoch as a UTC instant.
pub fn timestamp_from_ms(ms: i64) -> Result<OffsetDateTime> {
    from_parts(ms.div_euclid(1_000), ms.rem_euclid(1_000) * 1_000_000)
}

/// Microsecond timestamp, optionally shifted into `offset`. Without an offset
/// the instant is expressed in UTC.
pub fn timestamp_from_us(us: i64, offset: Option<UtcOffset>) -> Result<OffsetDateTime> {
    let ts = from_parts(us.div_euclid(1_000_000), us.rem_euclid(1_000_000) * 1_000)?;
    match offset {
        Some(offset) => ts
            .checked_to_offset(offset)
            .ok_or_else(|| out_of_range("timestamp microseconds", us)),
        None => Ok(ts),
    }
}

/// Nanoseconds since the epoch as a UTC instant.
pub fn timestamp_from_ns(ns: i64) -> Result<OffsetDateTime> {
    from_parts(ns.div_euclid(1_000_000_000), ns.rem_euclid(1_000_000_000))
}

/// Microseconds since the Unix epoch, truncated toward negative infinity.
pub fn micros_from_timestamp(ts: OffsetDateTime) -> Result<i64> {
    let micros = ts.unix_timestamp_nanos().div_euclid(1_000);
    i64::try_from(micros).map_err(|_| out_of_range("timestamp", ts))
}

/// Total seconds of an engine interval. A month counts as 30 days.
pub fn interval_seconds(months: i32, days: i32, micros: i64) -> f64 {
    let total = i128::from(micros)
        + i128::from(days) * MICROS_PER_DAY
        + i128::from(months) * DAYS_PER_MONTH * MICROS_PER_DAY;
    total as f64 / 1_000_000.0
}

/// Whole microseconds of a duration in seconds.
pub fn interval_micros(seconds: f64) -> Result<i64> {
    let micros = (seconds * 1_000_000.0).round();
    if micros.is_finite() && micros >= i64::MIN as f64 && micros <= i64::MAX as f64 {
        Ok(micros as i64)
    } else {
        Err(out_of_range("interval seconds", seconds))
    }
}

pub(crate) fn parse_date(text: &str) -> Result<Date> {
    Date::parse(text.trim(), format_description!("[year]-[month]-[day]")).map_err(|_| {
        Error::Conversion(format!(
            "Error occurred during parsing date. Given: \"{text}\". Expected format: (YYYY-MM-DD)"
        ))
    })
}

pub(crate) fn parse_timestamp(text: &str) -> Result<OffsetDateTime> {
    let normalized = text.trim().replacen('T', " ", 1);
    let with_fraction =
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]");
    let whole = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    PrimitiveDateTime::parse(&normalized, with_fraction)
        .or_else(|_| PrimitiveDateTime::parse(&normalized, whole))
        .map(PrimitiveDateTime::assume_utc)
        .or_else(|_| parse_date(&normalized).map(|d| d.midnight().assume_utc()))
        .map_err(|_| {
            Error::Conversion(format!(
                "Error occurred during parsing timestamp. Given: \"{text}\". Expected format: (YYYY-MM-DD hh:mm:ss[.zzzzzz])"
            ))
        })
}

//! Timestamp normalization.
//!
//! The store is the only authority on stored timestamps. Every value written or
//! returned passes through [`normalize`]: converted to UTC and truncated to
//! microseconds, the finest precision every backend can hold. Two backends fed
//! the same input therefore hand back bit-identical timestamps.

use chrono::{DateTime, SubsecRound, TimeZone, Utc};

/// Number of fractional-second digits kept on stored timestamps.
pub const PRECISION_DIGITS: u16 = 6;

/// Converts `ts` to UTC and truncates it to microsecond precision.
pub fn normalize<Tz: TimeZone>(ts: DateTime<Tz>) -> DateTime<Utc> {
    ts.with_timezone(&Utc).trunc_subsecs(PRECISION_DIGITS)
}

/// The current time, normalized.
pub fn now() -> DateTime<Utc> {
    normalize(Utc::now())
}

/// Encodes a timestamp as microseconds since the Unix epoch.
pub fn to_micros(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_micros()
}

/// Decodes microseconds since the Unix epoch. Returns `None` when out of range.
pub fn from_micros(micros: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros)
}

//! UTC tick conversion for event and token timestamps.
//!
//! Timestamps are stored as *ticks*: signed 64-bit counts of 100 ns units
//! since 0001-01-01T00:00:00Z. Encoding always goes through UTC, so a
//! message written in one timezone decodes to the same instant anywhere.
//! Conversion to local time only happens when rendering.

use chrono::{DateTime, Utc};

/// Ticks per second (one tick is 100 ns).
pub const TICKS_PER_SECOND: i64 = 10_000_000;

/// Tick value of the Unix epoch.
pub const UNIX_EPOCH_TICKS: i64 = 621_355_968_000_000_000;

/// Current UTC time.
#[inline(always)]
pub fn now_utc() -> DateTime<Utc> {
    Utc::now()
}

/// Converts a UTC instant to ticks.
///
/// Sub-tick precision (the last two decimal digits of the nanoseconds) is
/// truncated. Instants outside the representable range saturate.
pub fn to_ticks(time: DateTime<Utc>) -> i64 {
    let secs = time.timestamp();
    let sub = (time.timestamp_subsec_nanos() / 100) as i64;
    secs.saturating_mul(TICKS_PER_SECOND)
        .saturating_add(sub)
        .saturating_add(UNIX_EPOCH_TICKS)
}

/// Converts ticks back to a UTC instant.
///
/// Returns `None` for negative ticks or values chrono cannot represent.
pub fn from_ticks(ticks: i64) -> Option<DateTime<Utc>> {
    if ticks < 0 {
        return None;
    }
    let unix = ticks - UNIX_EPOCH_TICKS;
    let secs = unix.div_euclid(TICKS_PER_SECOND);
    let nanos = (unix.rem_euclid(TICKS_PER_SECOND) * 100) as u32;
    DateTime::<Utc>::from_timestamp(secs, nanos)
}

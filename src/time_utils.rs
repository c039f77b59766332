use chrono::{DateTime, SecondsFormat};
use once_cell::sync::Lazy;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

static MONO_ZERO: Lazy<Instant> = Lazy::new(Instant::now);

#[inline]
pub fn monotonic_now_ns() -> u64 {
    MONO_ZERO.elapsed().as_nanos() as u64
}

#[inline]
pub fn wall_clock_now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|dur| dur.as_millis() as u64)
        .unwrap_or(0)
}

/// RFC 3339 rendering of a tick timestamp; raw millis when out of chrono's
/// range.
pub fn format_unix_ms(ts_unix_ms: u64) -> String {
    i64::try_from(ts_unix_ms)
        .ok()
        .and_then(DateTime::from_timestamp_millis)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_else(|| format!("{ts_unix_ms}ms"))
}

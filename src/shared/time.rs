//! Usage: Wall-clock helpers (unix epoch seconds).

use std::time::{SystemTime, UNIX_EPOCH};

pub(crate) fn now_unix_seconds_f64() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

pub(crate) fn now_unix_seconds() -> i64 {
    now_unix_seconds_f64() as i64
}

//! Singleton windows.
//!
//! A job with a singleton window is stamped with the start of the window it was submitted in.
//! The job table has unique indexes over `(name, singleton_on)` and
//! `(name, singleton_on, singleton_key)`, so a second submission in the same window is
//! dropped by the insert's conflict clause rather than by a lookup beforehand.
//!
//! Throttling keeps the first job in a window. Debouncing additionally tries the next window
//! when the current one is taken, delaying the new job until that window opens.

use std::time::Duration;

use time::OffsetDateTime;

use crate::{Error, Result};

/// Reserved key prefix for the singleton queue: at most one job that has not started yet for
/// each name and key.
pub const SINGLETON_QUEUE_KEY: &str = "__slotq__singleton_queue";

/// The start of the `seconds`-wide window containing `now + offset`, with windows aligned to the
/// Unix epoch.
pub fn singleton_on(now: OffsetDateTime, seconds: u64, offset: u64) -> Result<OffsetDateTime> {
    let width = i64::try_from(seconds)
        .ok()
        .filter(|w| *w > 0)
        .ok_or_else(|| Error::validation(format!("invalid singleton window {seconds}s")))?;
    let offset = i64::try_from(offset)
        .map_err(|_| Error::validation(format!("invalid singleton offset {offset}s")))?;

    let slot = now
        .unix_timestamp()
        .checked_add(offset)
        .map(|t| t.div_euclid(width) * width)
        .ok_or_else(|| Error::validation("singleton window out of range"))?;

    OffsetDateTime::from_unix_timestamp(slot)
        .map_err(|_| Error::validation("singleton window out of range"))
}

/// How long to delay a debounced job so that it starts once the next window opens. Never zero,
/// and padded by a second for windows longer than one second.
pub fn debounce_start_after(seconds: u64, now: OffsetDateTime) -> Duration {
    let width_ms = i128::from(seconds.max(1)) * 1000;
    let now_ms = now.unix_timestamp_nanos() / 1_000_000;
    let elapsed = (now_ms - now_ms.div_euclid(width_ms) * width_ms) / 1000;

    let mut delay = seconds.saturating_sub(elapsed as u64).max(1);
    if seconds > 1 {
        delay += 1;
    }

    Duration::from_secs(delay)
}

/// Move a key into the singleton queue namespace, so that singleton queue jobs never collide
/// with ordinary keyed jobs. Keys already in the namespace are left alone.
pub(crate) fn singleton_queue_key(key: Option<String>, use_singleton_queue: bool) -> Option<String> {
    match key {
        Some(key) if use_singleton_queue && !key.is_empty() && key != SINGLETON_QUEUE_KEY => {
            Some(format!("{SINGLETON_QUEUE_KEY}{key}"))
        }
        key => key,
    }
}

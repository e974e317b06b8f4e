use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{Error, Result};

/// When a job should become eligible to run, as given by the caller.
///
/// Anything that does not describe a time in the future starts the job immediately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StartAfter {
    /// Delay the job by this many seconds. Zero, negative and non-finite values start the job
    /// immediately.
    Seconds(f64),
    /// Start the job at this time.
    At(#[serde(with = "time::serde::rfc3339")] OffsetDateTime),
    /// Either an RFC 3339 timestamp or an interval such as `"5 minutes"`. Other text starts the
    /// job immediately.
    Text(String),
    /// Any other JSON value. The job starts immediately.
    Other(serde_json::Value),
}

impl From<OffsetDateTime> for StartAfter {
    fn from(value: OffsetDateTime) -> Self {
        StartAfter::At(value)
    }
}

impl From<std::time::Duration> for StartAfter {
    fn from(value: std::time::Duration) -> Self {
        StartAfter::Seconds(value.as_secs_f64())
    }
}

/// Options for a single job submission. Every field is optional; anything left unset comes from
/// the [QueueDefaults](crate::QueueDefaults) or from the built-in defaults.
///
/// Where an option can be given in several units, the largest unit wins: `expire_in_hours`
/// beats `expire_in_minutes`, which beats `expire_in_seconds`.
///
/// The serialized form uses camelCase keys, so options can be passed through from JSON with
/// [JobOptions::from_json].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JobOptions {
    /// Jobs with higher priority are fetched first.
    pub priority: Option<i32>,

    /// How many times to retry the job. Must not be negative.
    pub retry_limit: Option<i64>,
    /// Seconds to wait before retrying. Must not be negative.
    pub retry_delay: Option<i64>,
    /// Back off exponentially between retries.
    pub retry_backoff: Option<bool>,

    /// Expire an active job after this many hours.
    pub expire_in_hours: Option<i64>,
    /// Expire an active job after this many minutes.
    pub expire_in_minutes: Option<i64>,
    /// Expire an active job after this many seconds.
    pub expire_in_seconds: Option<i64>,
    /// The removed single-value expiration option. It is ignored, and a warning is raised if it
    /// is present.
    #[serde(rename = "expireIn", skip_serializing_if = "Option::is_none")]
    pub legacy_expire_in: Option<serde_json::Value>,

    /// Keep the job for this many days.
    pub retention_days: Option<i64>,
    /// Keep the job for this many hours.
    pub retention_hours: Option<i64>,
    /// Keep the job for this many minutes.
    pub retention_minutes: Option<i64>,
    /// Keep the job for this many seconds.
    pub retention_seconds: Option<i64>,

    /// Track completion of this job.
    pub on_complete: Option<bool>,

    /// When the job may start.
    pub start_after: Option<StartAfter>,

    /// Scope singleton constraints to this key.
    pub singleton_key: Option<String>,
    /// Length of the singleton window, in hours.
    pub singleton_hours: Option<i64>,
    /// Length of the singleton window, in minutes.
    pub singleton_minutes: Option<i64>,
    /// Length of the singleton window, in seconds.
    pub singleton_seconds: Option<i64>,
    /// If the current window is taken, try the next one instead. This gives debounce behavior.
    pub singleton_next_slot: Option<bool>,
    /// Allow only one queued job for this name and key at a time.
    pub use_singleton_queue: Option<bool>,
}

impl JobOptions {
    /// Create an empty set of options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse options from an untyped JSON value. `null` gives the default options.
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::Null => Ok(Self::default()),
            serde_json::Value::Object(_) => serde_json::from_value(value)
                .map_err(|e| Error::validation(format!("invalid options: {e}"))),
            _ => Err(Error::validation("options should be an object")),
        }
    }

    /// Set the priority.
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Set the retry limit.
    pub fn retry_limit(mut self, retry_limit: i64) -> Self {
        self.retry_limit = Some(retry_limit);
        self
    }

    /// Set the retry delay, in seconds.
    pub fn retry_delay(mut self, retry_delay: i64) -> Self {
        self.retry_delay = Some(retry_delay);
        self
    }

    /// Set exponential retry backoff.
    pub fn retry_backoff(mut self, retry_backoff: bool) -> Self {
        self.retry_backoff = Some(retry_backoff);
        self
    }

    /// Set the expiration in hours.
    pub fn expire_in_hours(mut self, hours: i64) -> Self {
        self.expire_in_hours = Some(hours);
        self
    }

    /// Set the expiration in minutes.
    pub fn expire_in_minutes(mut self, minutes: i64) -> Self {
        self.expire_in_minutes = Some(minutes);
        self
    }

    /// Set the expiration in seconds.
    pub fn expire_in_seconds(mut self, seconds: i64) -> Self {
        self.expire_in_seconds = Some(seconds);
        self
    }

    /// Set the retention in days.
    pub fn retention_days(mut self, days: i64) -> Self {
        self.retention_days = Some(days);
        self
    }

    /// Set the retention in hours.
    pub fn retention_hours(mut self, hours: i64) -> Self {
        self.retention_hours = Some(hours);
        self
    }

    /// Set the retention in minutes.
    pub fn retention_minutes(mut self, minutes: i64) -> Self {
        self.retention_minutes = Some(minutes);
        self
    }

    /// Set the retention in seconds.
    pub fn retention_seconds(mut self, seconds: i64) -> Self {
        self.retention_seconds = Some(seconds);
        self
    }

    /// Set completion tracking.
    pub fn on_complete(mut self, on_complete: bool) -> Self {
        self.on_complete = Some(on_complete);
        self
    }

    /// Set when the job may start.
    pub fn start_after(mut self, start_after: impl Into<StartAfter>) -> Self {
        self.start_after = Some(start_after.into());
        self
    }

    /// Set the singleton key.
    pub fn singleton_key(mut self, key: impl Into<String>) -> Self {
        self.singleton_key = Some(key.into());
        self
    }

    /// Set the singleton window in hours.
    pub fn singleton_hours(mut self, hours: i64) -> Self {
        self.singleton_hours = Some(hours);
        self
    }

    /// Set the singleton window in minutes.
    pub fn singleton_minutes(mut self, minutes: i64) -> Self {
        self.singleton_minutes = Some(minutes);
        self
    }

    /// Set the singleton window in seconds.
    pub fn singleton_seconds(mut self, seconds: i64) -> Self {
        self.singleton_seconds = Some(seconds);
        self
    }

    /// Try the next singleton window when the current one is taken.
    pub fn singleton_next_slot(mut self, next_slot: bool) -> Self {
        self.singleton_next_slot = Some(next_slot);
        self
    }

    /// Allow only one queued job for this name and key.
    pub fn use_singleton_queue(mut self, use_singleton_queue: bool) -> Self {
        self.use_singleton_queue = Some(use_singleton_queue);
        self
    }
}

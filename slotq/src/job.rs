use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{Error, JobOptions, Result};

/// A request to submit a job to the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRequest {
    /// The queue name for the job. Must not be empty.
    pub name: String,
    /// The payload to pass to the job when it runs.
    #[serde(default)]
    pub data: Value,
    /// Scheduling, retry, retention and singleton options.
    #[serde(default)]
    pub options: JobOptions,
}

impl JobRequest {
    /// Create a request for the given queue name, with no payload and default options.
    pub fn new(name: impl Into<String>) -> Self {
        JobRequest {
            name: name.into(),
            data: Value::Null,
            options: JobOptions::default(),
        }
    }

    /// Create a request from its parts.
    pub fn from_parts(name: impl Into<String>, data: Value, options: JobOptions) -> Self {
        JobRequest {
            name: name.into(),
            data,
            options,
        }
    }

    /// Parse a request from an untyped `{ "name": ..., "data": ..., "options": ... }` object.
    pub fn from_json(value: Value) -> Result<Self> {
        let Value::Object(mut object) = value else {
            return Err(Error::validation("job request should be an object"));
        };

        let name = match object.remove("name") {
            Some(Value::String(name)) => name,
            Some(_) => return Err(Error::validation("job name must be a string")),
            None => return Err(Error::validation("job name is required")),
        };

        let data = object.remove("data").unwrap_or(Value::Null);
        let options = object
            .remove("options")
            .map(JobOptions::from_json)
            .transpose()?
            .unwrap_or_default();

        Ok(JobRequest {
            name,
            data,
            options,
        })
    }

    /// Set the payload of the job.
    pub fn data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    /// Serialize the payload of the job using `serde_json`.
    pub fn json_data<T: ?Sized + Serialize>(mut self, data: &T) -> Result<Self> {
        self.data = serde_json::to_value(data).map_err(Error::PayloadError)?;
        Ok(self)
    }

    /// Set the options for the job.
    pub fn options(mut self, options: JobOptions) -> Self {
        self.options = options;
        self
    }
}

/// A job for [Queue::insert](crate::Queue::insert), which adds many jobs at once.
///
/// Batch jobs skip most option resolution. Anything left unset takes the built-in default when
/// the row is written: priority 0, start immediately, expire after 15 minutes, keep for 14 days
/// after the start time, no retries and no completion tracking.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BatchJob {
    /// Use this ID instead of generating one.
    pub id: Option<Uuid>,
    /// The queue name for the job.
    pub name: String,
    /// The job payload.
    pub data: Value,
    /// The job priority.
    pub priority: Option<i32>,
    /// When the job may start.
    #[serde(with = "time::serde::rfc3339::option")]
    pub start_after: Option<OffsetDateTime>,
    /// The singleton key.
    pub singleton_key: Option<String>,
    /// Place the job in the singleton queue for its key.
    pub use_singleton_queue: Option<bool>,
    /// Expire an active job after this many seconds.
    pub expire_in_seconds: Option<u64>,
    /// Keep the job until this time.
    #[serde(with = "time::serde::rfc3339::option")]
    pub keep_until: Option<OffsetDateTime>,
    /// Track completion of this job.
    pub on_complete: Option<bool>,
    /// How many times to retry the job.
    pub retry_limit: Option<u32>,
    /// Seconds to wait before retrying.
    pub retry_delay: Option<u32>,
    /// Back off exponentially between retries.
    pub retry_backoff: Option<bool>,
}

impl BatchJob {
    /// Create a batch job for the given queue name.
    pub fn new(name: impl Into<String>) -> Self {
        BatchJob {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Parse a list of batch jobs from an untyped JSON array.
    pub fn list_from_json(value: Value) -> Result<Vec<BatchJob>> {
        if !value.is_array() {
            return Err(Error::validation(format!(
                "jobs argument should be an array, received {}",
                json_type_name(&value)
            )));
        }

        serde_json::from_value(value).map_err(|e| Error::validation(format!("invalid job: {e}")))
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

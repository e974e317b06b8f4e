use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// Which kind of UUID to generate for new jobs.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdVersion {
    /// Fully random identifiers.
    #[default]
    V4,
    /// Time-ordered identifiers with a random tail.
    V7,
}

impl IdVersion {
    pub(crate) fn generate(&self) -> Uuid {
        match self {
            IdVersion::V4 => Uuid::new_v4(),
            IdVersion::V7 => Uuid::now_v7(),
        }
    }
}

const MAX_SCHEMA_LENGTH: usize = 50;

/// Queue-wide defaults applied to every submitted job. Built once with
/// [QueueDefaults::builder] and then shared read-only.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueDefaults {
    schema: String,
    retry_limit: u32,
    retry_delay: u32,
    retry_backoff: bool,
    expire_in: Duration,
    keep_until: Duration,
    on_complete: bool,
    archive_interval: Duration,
    polling_interval: Duration,
    id_version: IdVersion,
}

impl Default for QueueDefaults {
    fn default() -> Self {
        QueueDefaults {
            schema: "main".to_string(),
            retry_limit: 0,
            retry_delay: 0,
            retry_backoff: false,
            expire_in: Duration::from_secs(15 * 60),
            keep_until: Duration::from_secs(14 * 24 * 60 * 60),
            on_complete: false,
            archive_interval: Duration::from_secs(12 * 60 * 60),
            polling_interval: Duration::from_secs(2),
            id_version: IdVersion::V4,
        }
    }
}

impl QueueDefaults {
    /// Create a [QueueDefaultsBuilder].
    pub fn builder() -> QueueDefaultsBuilder {
        QueueDefaultsBuilder::default()
    }

    /// The SQLite schema that holds the `job` table. This is `main` unless the table lives in an
    /// attached database.
    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Retries allowed when a job does not set its own limit.
    pub fn retry_limit(&self) -> u32 {
        self.retry_limit
    }

    /// Seconds to wait between retries when a job does not set its own delay.
    pub fn retry_delay(&self) -> u32 {
        self.retry_delay
    }

    /// Whether retries back off exponentially by default.
    pub fn retry_backoff(&self) -> bool {
        self.retry_backoff
    }

    /// How long a job may stay active before it expires.
    pub fn expire_in(&self) -> Duration {
        self.expire_in
    }

    /// How long a job is retained after it becomes eligible to start.
    pub fn keep_until(&self) -> Duration {
        self.keep_until
    }

    /// Whether completion tracking is on by default.
    pub fn on_complete(&self) -> bool {
        self.on_complete
    }

    /// How long finished jobs stay in the job table. Singleton windows may not be longer
    /// than this.
    pub fn archive_interval(&self) -> Duration {
        self.archive_interval
    }

    /// How often workers poll for new jobs.
    pub fn polling_interval(&self) -> Duration {
        self.polling_interval
    }

    /// The identifier format for new jobs.
    pub fn id_version(&self) -> IdVersion {
        self.id_version
    }

    /// Periodic maintenance only runs when the archive interval is at least a minute.
    pub fn maintenance_enabled(&self) -> bool {
        self.archive_interval >= Duration::from_secs(60)
    }
}

/// Builder for [QueueDefaults]. This can also be deserialized from a configuration file, in
/// which case all intervals are given in seconds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QueueDefaultsBuilder {
    schema: Option<String>,
    retry_limit: Option<u32>,
    retry_delay: Option<u32>,
    retry_backoff: Option<bool>,
    expire_in_seconds: Option<u64>,
    retention_seconds: Option<u64>,
    on_complete: Option<bool>,
    archive_interval_seconds: Option<u64>,
    polling_interval_seconds: Option<f64>,
    id_version: Option<IdVersion>,
}

impl QueueDefaultsBuilder {
    /// Set the schema that holds the `job` table.
    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Set the default retry limit.
    pub fn retry_limit(mut self, retry_limit: u32) -> Self {
        self.retry_limit = Some(retry_limit);
        self
    }

    /// Set the default retry delay, in seconds.
    pub fn retry_delay(mut self, retry_delay: u32) -> Self {
        self.retry_delay = Some(retry_delay);
        self
    }

    /// Set whether retries back off exponentially by default.
    pub fn retry_backoff(mut self, retry_backoff: bool) -> Self {
        self.retry_backoff = Some(retry_backoff);
        self
    }

    /// Set the default expiration interval.
    pub fn expire_in(mut self, expire_in: Duration) -> Self {
        self.expire_in_seconds = Some(expire_in.as_secs());
        self
    }

    /// Set the default retention interval.
    pub fn keep_until(mut self, keep_until: Duration) -> Self {
        self.retention_seconds = Some(keep_until.as_secs());
        self
    }

    /// Set whether completion tracking is on by default.
    pub fn on_complete(mut self, on_complete: bool) -> Self {
        self.on_complete = Some(on_complete);
        self
    }

    /// Set the archive interval.
    pub fn archive_interval(mut self, archive_interval: Duration) -> Self {
        self.archive_interval_seconds = Some(archive_interval.as_secs());
        self
    }

    /// Set the polling interval.
    pub fn polling_interval(mut self, polling_interval: Duration) -> Self {
        self.polling_interval_seconds = Some(polling_interval.as_secs_f64());
        self
    }

    /// Set the identifier format for new jobs.
    pub fn id_version(mut self, id_version: IdVersion) -> Self {
        self.id_version = Some(id_version);
        self
    }

    /// Validate the settings and build the [QueueDefaults].
    pub fn build(self) -> Result<QueueDefaults> {
        let base = QueueDefaults::default();

        let schema = self.schema.unwrap_or(base.schema);
        validate_schema(&schema)?;

        let expire_in = at_least_one_second("expireInSeconds", self.expire_in_seconds)?
            .unwrap_or(base.expire_in);
        let keep_until = at_least_one_second("retentionSeconds", self.retention_seconds)?
            .unwrap_or(base.keep_until);
        let archive_interval =
            at_least_one_second("archiveIntervalSeconds", self.archive_interval_seconds)?
                .unwrap_or(base.archive_interval);

        let polling_interval = match self.polling_interval_seconds {
            Some(seconds) if !seconds.is_finite() || seconds < 0.5 => {
                return Err(Error::validation(
                    "pollingIntervalSeconds must be at least 0.5",
                ));
            }
            Some(seconds) => Duration::from_secs_f64(seconds),
            None => base.polling_interval,
        };

        Ok(QueueDefaults {
            schema,
            retry_limit: self.retry_limit.unwrap_or(base.retry_limit),
            retry_delay: self.retry_delay.unwrap_or(base.retry_delay),
            retry_backoff: self.retry_backoff.unwrap_or(base.retry_backoff),
            expire_in,
            keep_until,
            on_complete: self.on_complete.unwrap_or(base.on_complete),
            archive_interval,
            polling_interval,
            id_version: self.id_version.unwrap_or(base.id_version),
        })
    }
}

fn at_least_one_second(name: &str, seconds: Option<u64>) -> Result<Option<Duration>> {
    match seconds {
        Some(0) => Err(Error::validation(format!("{name} must be at least 1"))),
        Some(s) => Ok(Some(Duration::from_secs(s))),
        None => Ok(None),
    }
}

fn validate_schema(schema: &str) -> Result<()> {
    let mut chars = schema.chars();
    let valid_start = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if !valid_start || !valid_rest || schema.len() > MAX_SCHEMA_LENGTH {
        return Err(Error::validation(format!(
            "schema name {schema:?} must start with a letter or underscore, contain only letters, digits and underscores, and be at most {MAX_SCHEMA_LENGTH} characters"
        )));
    }

    Ok(())
}

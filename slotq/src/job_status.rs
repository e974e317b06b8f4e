use std::{fmt::Display, str::FromStr, time::Duration};

use rusqlite::{Connection, OptionalExtension, Row};
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{Error, Queue, Result};

/// The current state of a job.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum JobState {
    /// The job is waiting to run.
    Created,
    /// The job failed and is waiting to be retried.
    Retry,
    /// The job is currently running.
    Active,
    /// The job finished successfully.
    Completed,
    /// The job ran for longer than its expiration interval.
    Expired,
    /// The job was cancelled.
    Cancelled,
    /// The job failed and exceeded its retry limit. It will not be retried.
    Failed,
}

impl JobState {
    /// Return a string representation of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Created => "created",
            JobState::Retry => "retry",
            JobState::Active => "active",
            JobState::Completed => "completed",
            JobState::Expired => "expired",
            JobState::Cancelled => "cancelled",
            JobState::Failed => "failed",
        }
    }
}

impl Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for JobState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "created" => Ok(JobState::Created),
            "retry" => Ok(JobState::Retry),
            "active" => Ok(JobState::Active),
            "completed" => Ok(JobState::Completed),
            "expired" => Ok(JobState::Expired),
            "cancelled" => Ok(JobState::Cancelled),
            "failed" => Ok(JobState::Failed),
            _ => Err(Error::InvalidJobState(s.to_string())),
        }
    }
}

/// Status information about a job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobStatus {
    /// The job's ID.
    pub id: Uuid,
    /// The queue name of the job.
    pub name: String,
    /// Higher priority jobs will be run first.
    pub priority: i32,
    /// The job's payload.
    pub data: Value,
    /// Where the job is in its lifecycle.
    pub state: JobState,
    /// The limit on the number of retries.
    pub retry_limit: u32,
    /// How many times the job has been retried.
    pub retry_count: u32,
    /// Seconds to wait between retries.
    pub retry_delay: u32,
    /// Back off exponentially between retries.
    pub retry_backoff: bool,
    /// When the job may start.
    pub start_after: OffsetDateTime,
    /// When the job's last run started.
    pub started_on: Option<OffsetDateTime>,
    /// The singleton key, if any.
    pub singleton_key: Option<String>,
    /// The start of the singleton window the job occupies.
    pub singleton_on: Option<OffsetDateTime>,
    /// How long the job may stay active.
    pub expire_in: Duration,
    /// When the job was submitted.
    pub created_on: OffsetDateTime,
    /// When the job finished.
    pub completed_on: Option<OffsetDateTime>,
    /// When the job may be removed.
    pub keep_until: OffsetDateTime,
    /// Whether completion is tracked for this job.
    pub on_complete: bool,
}

fn timestamp(row: &Row, idx: usize, name: &'static str) -> Result<OffsetDateTime> {
    let value = row.get::<_, i64>(idx).map_err(|e| Error::ColumnType(e, name))?;
    OffsetDateTime::from_unix_timestamp(value).map_err(|_| Error::TimestampOutOfRange(name))
}

fn optional_timestamp(row: &Row, idx: usize, name: &'static str) -> Result<Option<OffsetDateTime>> {
    row.get_ref(idx)?
        .as_i64_or_null()
        .map_err(|e| Error::ColumnType(e.into(), name))?
        .map(|t| {
            OffsetDateTime::from_unix_timestamp(t).map_err(|_| Error::TimestampOutOfRange(name))
        })
        .transpose()
}

impl Queue {
    pub(crate) fn run_job_status_query(
        conn: &Connection,
        schema: &str,
        id: Uuid,
    ) -> Result<Option<JobStatus>> {
        let mut stmt = conn.prepare_cached(&format!(
            r##"SELECT id, name, priority, data, state,
                retry_limit, retry_count, retry_delay, retry_backoff,
                start_after, started_on, singleton_key, singleton_on,
                expire_in, created_on, completed_on, keep_until, on_complete
            FROM {schema}.job
            WHERE id = ?1"##
        ))?;

        let mut rows = stmt.query_and_then([id], |row| {
            let data = row
                .get_ref(3)?
                .as_str_or_null()
                .map_err(|e| Error::ColumnType(e.into(), "data"))?
                .map(serde_json::from_str::<Value>)
                .transpose()
                .map_err(Error::InvalidStoredData)?
                .unwrap_or(Value::Null);

            let expire_in: i64 = row.get(13).map_err(|e| Error::ColumnType(e, "expire_in"))?;

            let status = JobStatus {
                id: row.get(0).map_err(|e| Error::ColumnType(e, "id"))?,
                name: row.get(1).map_err(|e| Error::ColumnType(e, "name"))?,
                priority: row.get(2)?,
                data,
                state: row
                    .get_ref(4)?
                    .as_str()
                    .map_err(|e| Error::ColumnType(e.into(), "state"))?
                    .parse()?,
                retry_limit: row.get(5)?,
                retry_count: row.get(6)?,
                retry_delay: row.get(7)?,
                retry_backoff: row.get(8)?,
                start_after: timestamp(row, 9, "start_after")?,
                started_on: optional_timestamp(row, 10, "started_on")?,
                singleton_key: row.get(11)?,
                singleton_on: optional_timestamp(row, 12, "singleton_on")?,
                expire_in: Duration::from_secs(expire_in.max(0) as u64),
                created_on: timestamp(row, 14, "created_on")?,
                completed_on: optional_timestamp(row, 15, "completed_on")?,
                keep_until: timestamp(row, 16, "keep_until")?,
                on_complete: row.get(17)?,
            };

            Ok::<_, Error>(status)
        })?;

        rows.next().transpose()
    }

    /// Return information about a job, or `None` if there is no job with this ID.
    pub fn get_job_by_id(&self, conn: &Connection, id: Uuid) -> Result<Option<JobStatus>> {
        Self::run_job_status_query(conn, self.defaults().schema(), id)
    }

    /// Return the state of a job, or `None` if there is no job with this ID.
    pub fn get_job_state(&self, conn: &Connection, id: Uuid) -> Result<Option<JobState>> {
        let schema = self.defaults().schema();
        let mut stmt = conn.prepare_cached(&format!("SELECT state FROM {schema}.job WHERE id = ?1"))?;
        let state = stmt
            .query_row([id], |row| row.get::<_, String>(0))
            .optional()?;

        state.map(|s| s.parse()).transpose()
    }
}

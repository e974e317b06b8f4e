use std::time::Duration;

use rusqlite::{named_params, Connection, OptionalExtension};
use serde_json::Value;
use time::OffsetDateTime;
use tracing::{event, instrument, Level};
use uuid::Uuid;

use crate::{
    resolve::{Retention, StartTime},
    singleton::{debounce_start_after, singleton_on},
    BatchJob, Error, QueueDefaults, ResolvedJobOptions, Result,
};

const BATCH_EXPIRE_IN: Duration = Duration::from_secs(15 * 60);
const BATCH_KEEP_FOR: Duration = Duration::from_secs(14 * 24 * 60 * 60);

/// A row to be written to the job table, with every time made absolute.
#[derive(Debug, Clone, PartialEq)]
pub struct EnqueueRecord {
    /// The new job's ID.
    pub id: Uuid,
    /// The queue name.
    pub name: String,
    /// The job priority.
    pub priority: i32,
    /// The job payload.
    pub data: Value,
    /// How many times to retry the job.
    pub retry_limit: u32,
    /// Seconds to wait between retries.
    pub retry_delay: u32,
    /// Back off exponentially between retries.
    pub retry_backoff: bool,
    /// When the job may start.
    pub start_after: OffsetDateTime,
    /// The singleton key, if any.
    pub singleton_key: Option<String>,
    /// Start of the singleton window this job occupies.
    pub singleton_on: Option<OffsetDateTime>,
    /// How long the job may stay active.
    pub expire_in: Duration,
    /// When the job was submitted.
    pub created_on: OffsetDateTime,
    /// When the job may be removed.
    pub keep_until: OffsetDateTime,
    /// Track completion of this job.
    pub on_complete: bool,
}

impl EnqueueRecord {
    /// Build the row for a resolved job. `offset` shifts the singleton window forward, and
    /// is zero except when retrying into the next window.
    pub fn new(
        id: Uuid,
        name: &str,
        data: &Value,
        options: &ResolvedJobOptions,
        now: OffsetDateTime,
        offset: u64,
    ) -> Result<Self> {
        let singleton_on = options
            .singleton_seconds
            .map(|seconds| singleton_on(now, seconds, offset))
            .transpose()?;

        let start_after = match options.start_after {
            Some(StartTime::At(at)) => at,
            Some(StartTime::After(delay)) => add("startAfter", now, delay)?,
            None => now,
        };

        let keep_until = match options.keep_until {
            Retention::Until(at) => at,
            Retention::For(keep) => add("keepUntil", start_after, keep)?,
        };

        Ok(EnqueueRecord {
            id,
            name: name.to_string(),
            priority: options.priority,
            data: data.clone(),
            retry_limit: options.retry_limit,
            retry_delay: options.retry_delay,
            retry_backoff: options.retry_backoff,
            start_after,
            singleton_key: options.singleton_key.clone(),
            singleton_on,
            expire_in: options.expire_in,
            created_on: now,
            keep_until,
            on_complete: options.on_complete,
        })
    }

    fn from_batch(job: BatchJob, id: Uuid, now: OffsetDateTime) -> Result<Self> {
        let start_after = job.start_after.unwrap_or(now);
        let keep_until = match job.keep_until {
            Some(at) => at,
            None => add("keepUntil", start_after, BATCH_KEEP_FOR)?,
        };

        let expire_in = match job.expire_in_seconds {
            Some(0) => return Err(Error::validation("expireInSeconds must be at least 1")),
            Some(seconds) => Duration::from_secs(seconds),
            None => BATCH_EXPIRE_IN,
        };

        Ok(EnqueueRecord {
            id,
            name: job.name,
            priority: job.priority.unwrap_or(0),
            data: job.data,
            retry_limit: job.retry_limit.unwrap_or(0),
            retry_delay: job.retry_delay.unwrap_or(0),
            retry_backoff: job.retry_backoff.unwrap_or(false),
            start_after,
            singleton_key: job.singleton_key,
            singleton_on: None,
            expire_in,
            created_on: now,
            keep_until,
            on_complete: job.on_complete.unwrap_or(false),
        })
    }
}

fn add(field: &str, base: OffsetDateTime, by: Duration) -> Result<OffsetDateTime> {
    time::Duration::try_from(by)
        .ok()
        .and_then(|by| base.checked_add(by))
        .ok_or_else(|| Error::validation(format!("{field} is out of range")))
}

/// Insert one row. Returns `None` if a uniqueness constraint suppressed the insert.
pub(crate) fn insert_record(
    conn: &Connection,
    schema: &str,
    record: &EnqueueRecord,
) -> Result<Option<Uuid>> {
    let data = match &record.data {
        Value::Null => None,
        data => Some(serde_json::to_string(data).map_err(Error::PayloadError)?),
    };
    let expire_in = i64::try_from(record.expire_in.as_secs())
        .map_err(|_| Error::validation("expireIn is out of range"))?;

    let mut stmt = conn.prepare_cached(&format!(
        r##"INSERT INTO {schema}.job
            (id, name, priority, data, state, retry_limit, retry_delay, retry_backoff,
                start_after, singleton_key, singleton_on, expire_in, created_on, keep_until,
                on_complete)
            VALUES
            ($id, $name, $priority, $data, 'created', $retry_limit, $retry_delay, $retry_backoff,
                $start_after, $singleton_key, $singleton_on, $expire_in, $created_on, $keep_until,
                $on_complete)
            ON CONFLICT DO NOTHING
            RETURNING id"##
    ))?;

    let id = stmt
        .query_row(
            named_params! {
                "$id": record.id,
                "$name": record.name,
                "$priority": record.priority,
                "$data": data,
                "$retry_limit": record.retry_limit,
                "$retry_delay": record.retry_delay,
                "$retry_backoff": record.retry_backoff,
                "$start_after": record.start_after.unix_timestamp(),
                "$singleton_key": record.singleton_key,
                "$singleton_on": record.singleton_on.map(|t| t.unix_timestamp()),
                "$expire_in": expire_in,
                "$created_on": record.created_on.unix_timestamp(),
                "$keep_until": record.keep_until.unix_timestamp(),
                "$on_complete": record.on_complete,
            },
            |row| row.get::<_, Uuid>(0),
        )
        .optional()?;

    Ok(id)
}

/// Write a resolved job to the job table on the caller's connection, and return its ID, or
/// `None` if a singleton constraint suppressed it.
///
/// A debounced job (`singleton_next_slot`) whose window is already taken gets exactly one more
/// attempt in the following window, starting when that window opens.
#[instrument(level = "debug", skip(conn, defaults, data, options), fields(schema = defaults.schema()))]
pub fn enqueue(
    conn: &Connection,
    defaults: &QueueDefaults,
    now: OffsetDateTime,
    name: &str,
    data: &Value,
    options: &ResolvedJobOptions,
) -> Result<Option<Uuid>> {
    let id = defaults.id_version().generate();
    let record = EnqueueRecord::new(id, name, data, options, now, 0)?;
    if let Some(id) = insert_record(conn, defaults.schema(), &record)? {
        event!(Level::DEBUG, %id, "inserted job");
        return Ok(Some(id));
    }

    let seconds = match options.singleton_seconds {
        Some(seconds) if options.singleton_next_slot => seconds,
        _ => {
            event!(Level::DEBUG, "job suppressed by singleton constraint");
            return Ok(None);
        }
    };

    let next_slot = ResolvedJobOptions {
        start_after: Some(StartTime::After(debounce_start_after(seconds, now))),
        singleton_next_slot: false,
        ..options.clone()
    };
    let record = EnqueueRecord::new(id, name, data, &next_slot, now, seconds)?;
    let inserted = insert_record(conn, defaults.schema(), &record)?;

    event!(
        Level::DEBUG,
        inserted = inserted.is_some(),
        singleton_on = ?record.singleton_on,
        "retried job in next singleton window"
    );

    Ok(inserted)
}

/// Insert many jobs at once, with built-in defaults for anything the jobs leave unset. Returns
/// the IDs of the jobs that were actually inserted.
#[instrument(level = "debug", skip(conn, defaults, jobs), fields(count = jobs.len()))]
pub(crate) fn insert_batch(
    conn: &Connection,
    defaults: &QueueDefaults,
    now: OffsetDateTime,
    jobs: Vec<BatchJob>,
) -> Result<Vec<Uuid>> {
    let records = jobs
        .into_iter()
        .map(|job| {
            let id = job.id.unwrap_or_else(|| defaults.id_version().generate());
            EnqueueRecord::from_batch(job, id, now)
        })
        .collect::<Result<Vec<_>>>()?;

    let mut ids = Vec::with_capacity(records.len());
    for record in &records {
        if let Some(id) = insert_record(conn, defaults.schema(), record)? {
            ids.push(id);
        }
    }

    Ok(ids)
}

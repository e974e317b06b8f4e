use std::{
    ops::Deref,
    path::{Path, PathBuf},
    sync::{atomic::Ordering, atomic::AtomicI64, Arc},
    time::Duration,
};

use rusqlite::Connection;
use serde_json::Value;
use time::OffsetDateTime;
use tracing::{event, instrument, Level};
use uuid::Uuid;

use crate::{
    clock::{Clock, SystemClock},
    diagnostics::{Diagnostics, WarningKind},
    enqueue::{enqueue, insert_batch},
    error::*,
    job_status::JobStatus,
    resolve::{resolve, resolve_batch, ResolvedJobOptions},
    shared_state::{SharedState, SharedStateData},
    BatchJob, JobOptions, JobRequest, QueueDefaults, StartAfter,
};

/// Clock differences up to this many seconds are not reported.
const CLOCK_SKEW_WARNING_SECONDS: i64 = 60;

/// Options used to configure a [Queue] instance.
pub struct QueueOptions {
    defaults: QueueDefaults,
    diagnostics: Diagnostics,
    clock: Box<dyn Clock>,
    recycle_timeout: Duration,
}

impl Default for QueueOptions {
    fn default() -> Self {
        QueueOptions {
            defaults: QueueDefaults::default(),
            diagnostics: Diagnostics::new(),
            clock: Box::new(SystemClock),
            recycle_timeout: Duration::from_secs(5 * 60),
        }
    }
}

impl QueueOptions {
    /// Create a new options object for a [Queue]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the queue-wide job defaults.
    pub fn defaults(mut self, defaults: QueueDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Set where warnings are delivered.
    pub fn diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Use a different clock. Singleton windows and start times are computed from this clock.
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// How long an idle pooled connection may sit before it is checked again. Only used by
    /// [QueueOptions::open].
    pub fn recycle_timeout(mut self, timeout: Duration) -> Self {
        self.recycle_timeout = timeout;
        self
    }

    /// Build a [Queue] that works on connections supplied by the caller. The job table must
    /// already exist; see [migrate](crate::migrate).
    pub fn build(self) -> Queue {
        let QueueOptions {
            defaults,
            diagnostics,
            clock,
            ..
        } = self;

        if !defaults.maintenance_enabled() {
            diagnostics.emit(WarningKind::MaintenanceDisabled, None, false);
        }

        Queue {
            state: SharedState(Arc::new(SharedStateData {
                defaults,
                diagnostics,
                clock,
                clock_skew: AtomicI64::new(0),
            })),
        }
    }

    /// Open or create a queue database at the given path, and manage a pool of connections
    /// to it.
    pub async fn open(self, path: &Path) -> Result<PooledQueue> {
        PooledQueue::open(self, path).await
    }
}

/// The queue handle. It holds the defaults, warning state and clock, and writes jobs through a
/// connection supplied by the caller, so a job can be added in the same transaction as other
/// work. Cloning a `Queue` is cheap and clones share their state.
#[derive(Clone)]
pub struct Queue {
    pub(crate) state: SharedState,
}

impl std::fmt::Debug for Queue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Queue")
            .field("defaults", &self.state.defaults)
            .field("clock_skew", &self.state.clock_skew)
            .finish_non_exhaustive()
    }
}

impl Queue {
    /// Create a builder object for a Queue
    pub fn builder() -> QueueOptions {
        QueueOptions::new()
    }

    /// Create a queue with the given defaults, the system clock, and a warning sink that only
    /// logs.
    pub fn new(defaults: QueueDefaults) -> Queue {
        QueueOptions::new().defaults(defaults).build()
    }

    /// The queue-wide job defaults.
    pub fn defaults(&self) -> &QueueDefaults {
        &self.state.defaults
    }

    /// The warning sink.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.state.diagnostics
    }

    /// The current time, corrected by the skew measured in the last
    /// [check_clock_skew](Queue::check_clock_skew).
    pub fn now(&self) -> OffsetDateTime {
        self.state.now()
    }

    /// The last measured difference between the database clock and the local clock.
    pub fn clock_skew(&self) -> time::Duration {
        time::Duration::seconds(self.state.clock_skew.load(Ordering::Relaxed))
    }

    /// Resolve a request's options against this queue's defaults.
    pub fn resolve(&self, request: &JobRequest) -> Result<ResolvedJobOptions> {
        resolve(request, self.defaults(), self.diagnostics())
    }

    /// Write a job with already-resolved options. Returns `None` if a singleton constraint
    /// suppressed it.
    pub fn enqueue(
        &self,
        conn: &Connection,
        name: &str,
        data: &Value,
        options: &ResolvedJobOptions,
    ) -> Result<Option<Uuid>> {
        enqueue(conn, self.defaults(), self.now(), name, data, options)
    }

    /// Submit a job. Returns its ID, or `None` if a singleton constraint suppressed it.
    ///
    /// The job is written with `conn` and nothing is committed or rolled back here, so passing
    /// a [rusqlite::Transaction] makes the job part of that transaction.
    #[instrument(level = "debug", skip(self, conn, request), fields(name = %request.name))]
    pub fn send(&self, conn: &Connection, request: &JobRequest) -> Result<Option<Uuid>> {
        let options = self.resolve(request)?;
        self.enqueue(conn, &request.name, &request.data, &options)
    }

    /// Submit a job unless an unfinished job with the same name and key exists. The key
    /// defaults to the job name.
    pub fn send_once(
        &self,
        conn: &Connection,
        name: &str,
        data: Value,
        options: JobOptions,
        key: Option<&str>,
    ) -> Result<Option<Uuid>> {
        let options = options.singleton_key(key.unwrap_or(name));
        self.send(conn, &JobRequest::from_parts(name, data, options))
    }

    /// Submit a job unless a job with the same name is already waiting to start.
    pub fn send_singleton(
        &self,
        conn: &Connection,
        name: &str,
        data: Value,
        options: JobOptions,
    ) -> Result<Option<Uuid>> {
        let options = options.singleton_key(crate::SINGLETON_QUEUE_KEY);
        self.send(conn, &JobRequest::from_parts(name, data, options))
    }

    /// Submit a job that starts later.
    pub fn send_after(
        &self,
        conn: &Connection,
        name: &str,
        data: Value,
        options: JobOptions,
        start_after: impl Into<StartAfter>,
    ) -> Result<Option<Uuid>> {
        let options = options.start_after(start_after);
        self.send(conn, &JobRequest::from_parts(name, data, options))
    }

    /// Submit a job, keeping only the first job in each window of `seconds`.
    pub fn send_throttled(
        &self,
        conn: &Connection,
        name: &str,
        data: Value,
        options: JobOptions,
        seconds: i64,
        key: Option<&str>,
    ) -> Result<Option<Uuid>> {
        let options = windowed(options, seconds, key, false);
        self.send(conn, &JobRequest::from_parts(name, data, options))
    }

    /// Submit a job, moving it to the next window of `seconds` if the current window already
    /// has one.
    pub fn send_debounced(
        &self,
        conn: &Connection,
        name: &str,
        data: Value,
        options: JobOptions,
        seconds: i64,
        key: Option<&str>,
    ) -> Result<Option<Uuid>> {
        let options = windowed(options, seconds, key, true);
        self.send(conn, &JobRequest::from_parts(name, data, options))
    }

    /// Add many jobs at once. Only the singleton queue key rewrite is applied to these jobs;
    /// unset values take the built-in defaults rather than the queue defaults. Returns the IDs
    /// of the jobs that were inserted.
    pub fn insert(&self, conn: &Connection, jobs: Vec<BatchJob>) -> Result<Vec<Uuid>> {
        let jobs = resolve_batch(jobs)?;
        insert_batch(conn, self.defaults(), self.now(), jobs)
    }

    /// Compare the local clock with the database clock, and correct [Queue::now] by the
    /// difference from then on. A difference of more than a minute raises a warning every
    /// time it is measured.
    #[instrument(level = "debug", skip_all)]
    pub fn check_clock_skew(&self, conn: &Connection) -> Result<time::Duration> {
        let db_now: i64 = conn.query_row(
            "SELECT CAST(strftime('%s', 'now') AS INTEGER)",
            [],
            |row| row.get(0),
        )?;
        let skew = db_now - self.state.clock.now().unix_timestamp();
        self.state.clock_skew.store(skew, Ordering::Relaxed);

        if skew.abs() > CLOCK_SKEW_WARNING_SECONDS {
            let direction = if skew > 0 { "ahead of" } else { "behind" };
            self.diagnostics().emit(
                WarningKind::ClockSkew,
                Some(format!("database is {}s {direction} this instance", skew.abs())),
                true,
            );
        } else {
            event!(Level::DEBUG, skew, "clock skew");
        }

        Ok(time::Duration::seconds(skew))
    }
}

fn windowed(options: JobOptions, seconds: i64, key: Option<&str>, next_slot: bool) -> JobOptions {
    let options = options
        .singleton_seconds(seconds)
        .singleton_next_slot(next_slot);
    match key {
        Some(key) => options.singleton_key(key),
        None => options,
    }
}

/// A [Queue] that owns a pool of connections to its database. Each call runs in its own short
/// transaction.
#[derive(Debug)]
pub struct PooledQueue {
    queue: Queue,
    pool: deadpool_sqlite::Pool,
    path: PathBuf,
}

impl Deref for PooledQueue {
    type Target = Queue;

    fn deref(&self) -> &Self::Target {
        &self.queue
    }
}

impl PooledQueue {
    async fn open(options: QueueOptions, path: &Path) -> Result<PooledQueue> {
        if options.defaults.schema() != "main" {
            return Err(Error::validation(
                "a pooled queue keeps its job table in the main schema",
            ));
        }

        let mut conn = Connection::open(path).map_err(Error::open_database)?;
        conn.pragma_update_and_check(None, "journal_mode", "wal", |_| Ok(()))
            .map_err(Error::open_database)?;
        conn.pragma_update(None, "synchronous", "normal")
            .map_err(Error::open_database)?;
        crate::migrations::migrate(&mut conn)?;
        drop(conn);

        let pool = deadpool_sqlite::Config::new(path)
            .builder(deadpool_sqlite::Runtime::Tokio1)
            .map_err(Error::open_database)?
            .recycle_timeout(Some(options.recycle_timeout))
            .build()
            .map_err(Error::open_database)?;

        let queue = PooledQueue {
            queue: options.build(),
            pool,
            path: path.to_path_buf(),
        };

        queue.check_clock_skew().await?;
        event!(Level::INFO, path = %queue.path.display(), "opened queue");

        Ok(queue)
    }

    /// The path of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Submit a job in its own transaction.
    pub async fn add_job(&self, request: JobRequest) -> Result<Option<Uuid>> {
        let queue = self.queue.clone();
        let conn = self.pool.get().await?;
        conn.interact(move |conn| {
            let tx = conn.transaction()?;
            let id = queue.send(&tx, &request)?;
            tx.commit()?;
            Ok::<_, Error>(id)
        })
        .await?
    }

    /// Submit multiple jobs in one transaction. Each result corresponds to the request at the
    /// same position. If any request is invalid, none of the jobs are added.
    pub async fn add_jobs(&self, requests: Vec<JobRequest>) -> Result<Vec<Option<Uuid>>> {
        let queue = self.queue.clone();
        let conn = self.pool.get().await?;
        conn.interact(move |conn| {
            let tx = conn.transaction()?;
            let ids = requests
                .iter()
                .map(|request| queue.send(&tx, request))
                .collect::<Result<Vec<_>>>()?;
            tx.commit()?;
            Ok::<_, Error>(ids)
        })
        .await?
    }

    /// Bulk insert jobs in one transaction. See [Queue::insert].
    pub async fn insert_jobs(&self, jobs: Vec<BatchJob>) -> Result<Vec<Uuid>> {
        let queue = self.queue.clone();
        let conn = self.pool.get().await?;
        conn.interact(move |conn| {
            let tx = conn.transaction()?;
            let ids = queue.insert(&tx, jobs)?;
            tx.commit()?;
            Ok::<_, Error>(ids)
        })
        .await?
    }

    /// Return information about a job, or `None` if there is no job with this ID.
    pub async fn get_job_status(&self, id: Uuid) -> Result<Option<JobStatus>> {
        let queue = self.queue.clone();
        let conn = self.pool.get().await?;
        conn.interact(move |conn| queue.get_job_by_id(conn, id))
            .await?
    }

    /// Measure the clock skew against the database. See [Queue::check_clock_skew].
    pub async fn check_clock_skew(&self) -> Result<time::Duration> {
        let queue = self.queue.clone();
        let conn = self.pool.get().await?;
        conn.interact(move |conn| queue.check_clock_skew(conn))
            .await?
    }

    /// Close the connection pool. Calls made after this fail.
    pub fn close(&self) {
        self.pool.close();
    }
}

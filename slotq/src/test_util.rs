use std::{
    ops::Deref,
    sync::{Arc, Mutex},
};

use once_cell::sync::Lazy;
use rusqlite::Connection;
use serde_json::Value;
use temp_dir::TempDir;
use time::{macros::datetime, OffsetDateTime};
use uuid::Uuid;

use crate::{
    clock::ManualClock, diagnostics::Warning, Diagnostics, PooledQueue, Queue, QueueDefaults,
    ResolvedJobOptions, Result,
};

pub struct TestQueue {
    queue: PooledQueue,
    dir: TempDir,
}

impl Deref for TestQueue {
    type Target = PooledQueue;

    fn deref(&self) -> &Self::Target {
        &self.queue
    }
}

impl TestQueue {
    pub fn close_and_persist(self) -> TempDir {
        self.queue.close();
        self.dir
    }
}

pub async fn create_test_queue(dir: TempDir) -> TestQueue {
    Lazy::force(&TRACING);
    let path = dir.child("test.sqlite");
    let queue = Queue::builder().open(&path).await.unwrap();

    TestQueue { queue, dir }
}

/// An in-memory job table, with a queue whose clock only moves when told to.
pub(crate) struct TestEnvironment {
    pub conn: Connection,
    pub queue: Queue,
    pub clock: ManualClock,
    /// Where the clock starts. This is on a minute boundary, so it starts a singleton window
    /// for any width that divides 60.
    pub start_time: OffsetDateTime,
    pub warnings: Arc<Mutex<Vec<Warning>>>,
}

impl TestEnvironment {
    pub fn new() -> Self {
        Self::with_defaults(QueueDefaults::default())
    }

    pub fn with_defaults(defaults: QueueDefaults) -> Self {
        Lazy::force(&TRACING);

        let mut conn = Connection::open_in_memory().unwrap();
        crate::migrate(&mut conn).unwrap();

        let start_time = datetime!(2024-01-15 09:00:00 UTC);
        let clock = ManualClock::new(start_time);
        let warnings = Arc::new(Mutex::new(Vec::new()));
        let diagnostics = {
            let warnings = warnings.clone();
            Diagnostics::with_listener(move |w| warnings.lock().unwrap().push(w.clone()))
        };

        let queue = Queue::builder()
            .defaults(defaults)
            .diagnostics(diagnostics)
            .clock(clock.clone())
            .build();

        TestEnvironment {
            conn,
            queue,
            clock,
            start_time,
            warnings,
        }
    }

    pub fn enqueue(&self, name: &str, options: &ResolvedJobOptions) -> Result<Option<Uuid>> {
        self.queue.enqueue(&self.conn, name, &Value::Null, options)
    }

    pub fn count_jobs(&self, name: &str) -> i64 {
        self.conn
            .query_row("SELECT COUNT(*) FROM job WHERE name = ?", [name], |row| {
                row.get(0)
            })
            .unwrap()
    }

    /// Move a job to another state, standing in for a worker.
    pub fn set_state(&self, id: Uuid, state: &str) {
        let updated = self
            .conn
            .execute(
                "UPDATE job SET state = ?1 WHERE id = ?2",
                rusqlite::params![state, id],
            )
            .unwrap();
        assert_eq!(updated, 1, "job {id} not found");
    }

    pub fn warnings(&self) -> Vec<Warning> {
        self.warnings.lock().unwrap().clone()
    }
}

pub static TRACING: Lazy<()> = Lazy::new(|| {
    if std::env::var("TEST_LOG").is_ok() {
        configure_tracing();
    }
});

fn configure_tracing() {
    use tracing_subscriber::layer::SubscriberExt;
    let tree = tracing_tree::HierarchicalLayer::new(2)
        .with_targets(true)
        .with_bracketed_fields(true);

    let subscriber = tracing_subscriber::Registry::default().with(tree);

    tracing::subscriber::set_global_default(subscriber).unwrap();
}

use eyre::{eyre, Result};
use std::{path::PathBuf, sync::Arc, time::Duration};
use uuid::Uuid;

use clap::{Parser, ValueEnum};
use slotq::{JobOptions, JobRequest, PooledQueue, Queue, QueueDefaults};
use temp_dir::TempDir;
use tracing_subscriber::EnvFilter;

#[derive(ValueEnum, Debug, Clone, Copy)]
enum Mode {
    /// No singleton constraints.
    Plain,
    /// Keep the first job in each window.
    Throttle,
    /// Move later jobs into the next window.
    Debounce,
    /// One unfinished job per key.
    Once,
    /// One waiting job per name.
    Singleton,
}

#[derive(Parser, Debug)]
struct Args {
    /// The database file. Defaults to a file in a temporary directory.
    #[arg(long)]
    db: Option<PathBuf>,

    #[arg(short, long, value_enum, default_value_t = Mode::Throttle)]
    mode: Mode,

    /// Jobs to submit from each task.
    #[arg(short = 'n', long, default_value_t = 5)]
    count: usize,

    /// Concurrent submitting tasks.
    #[arg(long, default_value_t = 1)]
    tasks: usize,

    /// Singleton window, in seconds.
    #[arg(short, long, default_value_t = 10)]
    window: i64,

    #[arg(short, long)]
    key: Option<String>,

    /// Delay between submissions from one task, in milliseconds.
    #[arg(long, default_value_t = 1000)]
    spacing_ms: u64,

    #[arg(long, default_value = "demo")]
    name: String,
}

impl Args {
    fn request(&self, task: usize, seq: usize) -> JobRequest {
        let options = match self.mode {
            Mode::Plain => JobOptions::new(),
            Mode::Throttle => JobOptions::new().singleton_seconds(self.window),
            Mode::Debounce => JobOptions::new()
                .singleton_seconds(self.window)
                .singleton_next_slot(true),
            Mode::Once => JobOptions::new().singleton_key(self.name.clone()),
            Mode::Singleton => JobOptions::new().singleton_key(slotq::SINGLETON_QUEUE_KEY),
        };

        let options = match (&self.key, self.mode) {
            (Some(key), Mode::Throttle | Mode::Debounce | Mode::Once) => {
                options.singleton_key(key.clone())
            }
            _ => options,
        };

        JobRequest::new(self.name.clone())
            .data(serde_json::json!({ "task": task, "seq": seq }))
            .options(options)
    }
}

async fn submit_task(
    queue: Arc<PooledQueue>,
    args: Arc<Args>,
    task: usize,
) -> Result<Vec<Option<Uuid>>> {
    let mut ids = Vec::with_capacity(args.count);
    for seq in 0..args.count {
        if seq > 0 {
            tokio::time::sleep(Duration::from_millis(args.spacing_ms)).await;
        }

        let id = queue.add_job(args.request(task, seq)).await?;
        match id {
            Some(id) => println!("[task {task}] job {seq}: added {id}"),
            None => println!("[task {task}] job {seq}: suppressed"),
        }
        ids.push(id);
    }

    Ok(ids)
}

async fn run() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Arc::new(Args::parse());
    if args.tasks == 0 {
        return Err(eyre!("--tasks must be at least 1"));
    }

    let dir = TempDir::new()?;
    let path = args
        .db
        .clone()
        .unwrap_or_else(|| dir.path().join("slotq.db"));

    let defaults = QueueDefaults::builder().build()?;
    let queue = Arc::new(Queue::builder().defaults(defaults).open(&path).await?);
    tracing::info!(path = %queue.path().display(), mode = ?args.mode, "queue opened");

    let submit_tasks = (0..args.tasks)
        .map(|task| tokio::spawn(submit_task(queue.clone(), args.clone(), task)))
        .collect::<Vec<_>>();

    let mut added = Vec::new();
    let mut suppressed = 0;
    for task in submit_tasks {
        for id in task.await?? {
            match id {
                Some(id) => added.push(id),
                None => suppressed += 1,
            }
        }
    }

    println!("{} added, {suppressed} suppressed", added.len());

    for id in added {
        let status = queue
            .get_job_status(id)
            .await?
            .ok_or_else(|| eyre!("job {id} is missing"))?;
        println!(
            "{id} state={} start_after={} singleton_on={}",
            status.state,
            status.start_after,
            status
                .singleton_on
                .map(|t| t.to_string())
                .unwrap_or_else(|| "-".to_string())
        );
    }

    queue.close();

    Ok(())
}

#[cfg(not(feature = "rt-multi-thread"))]
#[tokio::main(flavor = "current_thread")]
pub async fn main() -> Result<()> {
    run().await
}

#[cfg(feature = "rt-multi-thread")]
#[tokio::main(flavor = "multi_thread")]
pub async fn main() -> Result<()> {
    run().await
}

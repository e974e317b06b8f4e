#![warn(missing_docs)]
//! Job submission for a SQLite-backed job queue.
//!
//! Jobs are written to a `job` table with a caller-supplied connection, so adding a job can be
//! part of a larger transaction. Options are resolved against queue-wide defaults first, and
//! singleton windows let repeated submissions collapse into one job: throttling keeps the first
//! job in a window, and debouncing moves later submissions into the next window.
//!
//! ```no_run
//! # use serde_json::json;
//! use slotq::{Error, JobOptions, JobRequest, JobState, Queue, QueueDefaults};
//!
//! fn main() -> Result<(), Error> {
//!   let mut conn = rusqlite::Connection::open("slotq.db")?;
//!   slotq::migrate(&mut conn)?;
//!
//!   let queue = Queue::new(QueueDefaults::builder().retry_limit(2).build()?);
//!
//!   let tx = conn.transaction()?;
//!   // Write other records here...
//!
//!   // Send at most one reminder per user every 10 minutes.
//!   let job_id = queue.send(
//!     &tx,
//!     &JobRequest::new("remind_me")
//!       .data(json!({ "email": "me@example.com" }))
//!       .options(
//!         JobOptions::new()
//!           .singleton_key("user-42")
//!           .singleton_minutes(10),
//!       ),
//!   )?;
//!   tx.commit()?;
//!
//!   if let Some(job_id) = job_id {
//!     let state = queue.get_job_state(&conn, job_id)?;
//!     assert_eq!(state, Some(JobState::Created));
//!   }
//!
//!   Ok(())
//! }
//! ```

mod clock;
mod defaults;
mod diagnostics;
mod enqueue;
mod error;
mod interval;
mod job;
mod job_status;
mod migrations;
mod options;
mod queue;
mod resolve;
mod shared_state;
mod singleton;
#[cfg(test)]
mod test_util;

pub use clock::{Clock, ManualClock, SystemClock};
pub use defaults::{IdVersion, QueueDefaults, QueueDefaultsBuilder};
pub use diagnostics::{Diagnostics, Warning, WarningKind};
pub use enqueue::{enqueue, EnqueueRecord};
pub use error::{Error, ErrorKind, Result};
pub use interval::{format_interval, parse_interval};
pub use job::{BatchJob, JobRequest};
pub use job_status::{JobState, JobStatus};
pub use migrations::migrate;
pub use options::{JobOptions, StartAfter};
pub use queue::*;
pub use resolve::{resolve, resolve_batch, ResolvedJobOptions, Retention, StartTime};
pub use singleton::{debounce_start_after, singleton_on, SINGLETON_QUEUE_KEY};

use std::time::Duration;

use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tracing::{event, instrument, Level};

use crate::{
    diagnostics::{Diagnostics, WarningKind},
    interval::{format_interval, parse_interval},
    singleton::singleton_queue_key,
    BatchJob, Error, JobOptions, JobRequest, QueueDefaults, Result, StartAfter,
};

/// When a resolved job becomes eligible to run.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StartTime {
    /// At a fixed time.
    At(OffsetDateTime),
    /// This long after the job is inserted.
    After(Duration),
}

/// How long a resolved job is kept.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Retention {
    /// For this long after the job's start time.
    For(Duration),
    /// Until a fixed time.
    Until(OffsetDateTime),
}

/// The fully-resolved options for a job, ready to be written to the job table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedJobOptions {
    /// Jobs with higher priority are fetched first.
    pub priority: i32,
    /// When the job may start. `None` means immediately.
    pub start_after: Option<StartTime>,
    /// How long the job may stay active before it expires.
    pub expire_in: Duration,
    /// How long the job is kept.
    pub keep_until: Retention,
    /// How many times to retry the job.
    pub retry_limit: u32,
    /// Seconds to wait between retries.
    pub retry_delay: u32,
    /// Back off exponentially between retries.
    pub retry_backoff: bool,
    /// The singleton key, if any.
    pub singleton_key: Option<String>,
    /// The singleton window in seconds, if any.
    pub singleton_seconds: Option<u64>,
    /// Try the next singleton window if the current one is taken.
    pub singleton_next_slot: bool,
    /// Track completion of this job.
    pub on_complete: bool,
}

impl ResolvedJobOptions {
    /// Resolve `request` against the queue defaults. See [resolve].
    pub fn resolve(
        request: &JobRequest,
        defaults: &QueueDefaults,
        diagnostics: &Diagnostics,
    ) -> Result<Self> {
        resolve(request, defaults, diagnostics)
    }
}

/// Resolve the options in a job request against the queue defaults, producing one canonical
/// set of values. The request is not modified.
///
/// Fails with [Error::Validation] if the name is empty, a numeric option is out of range, a
/// start time string can not be parsed, or the singleton window is longer than the queue's
/// archive interval.
#[instrument(level = "debug", skip_all, fields(name = %request.name))]
pub fn resolve(
    request: &JobRequest,
    defaults: &QueueDefaults,
    diagnostics: &Diagnostics,
) -> Result<ResolvedJobOptions> {
    if request.name.is_empty() {
        return Err(Error::validation("job name is required"));
    }

    let options = &request.options;
    let (retry_limit, retry_delay, retry_backoff) = resolve_retry(options, defaults)?;
    let expire_in = resolve_expiration(options, defaults, diagnostics)?;
    let keep_until = resolve_retention(options, defaults)?;
    let start_after = resolve_start_after(options.start_after.as_ref())?;
    let singleton_seconds = resolve_singleton_seconds(options)?;
    let singleton_key = singleton_queue_key(
        options.singleton_key.clone(),
        options.use_singleton_queue.unwrap_or(false),
    );

    if let Some(seconds) = singleton_seconds {
        let archive_seconds = defaults.archive_interval().as_secs();
        if seconds > archive_seconds {
            return Err(Error::validation(format!(
                "throttling interval {seconds}s cannot exceed archive interval {archive_seconds}s"
            )));
        }
    }

    let resolved = ResolvedJobOptions {
        priority: options.priority.unwrap_or(0),
        start_after,
        expire_in,
        keep_until,
        retry_limit,
        retry_delay,
        retry_backoff,
        singleton_key,
        singleton_seconds,
        singleton_next_slot: options.singleton_next_slot.unwrap_or(false),
        on_complete: options.on_complete.unwrap_or_else(|| defaults.on_complete()),
    };

    event!(
        Level::TRACE,
        expire_in = %format_interval(resolved.expire_in),
        singleton_seconds = ?resolved.singleton_seconds,
        "resolved job options"
    );

    Ok(resolved)
}

/// Prepare jobs for a bulk insert. Only the singleton queue key rewrite is applied; everything
/// else is filled in with the built-in defaults when the rows are written.
pub fn resolve_batch(jobs: Vec<BatchJob>) -> Result<Vec<BatchJob>> {
    jobs.into_iter()
        .enumerate()
        .map(|(i, mut job)| {
            if job.name.is_empty() {
                return Err(Error::validation(format!("job {i} has no name")));
            }

            let use_singleton_queue = job.use_singleton_queue.take().unwrap_or(false);
            job.singleton_key = singleton_queue_key(job.singleton_key.take(), use_singleton_queue);
            Ok(job)
        })
        .collect()
}

fn non_negative(name: &str, value: Option<i64>) -> Result<Option<u32>> {
    value
        .map(|v| {
            u32::try_from(v)
                .map_err(|_| Error::validation(format!("{name} must be an integer >= 0")))
        })
        .transpose()
}

fn resolve_retry(options: &JobOptions, defaults: &QueueDefaults) -> Result<(u32, u32, bool)> {
    let retry_delay = non_negative("retryDelay", options.retry_delay)?;
    let retry_limit = non_negative("retryLimit", options.retry_limit)?;

    // A zero from the caller does not override a nonzero default.
    let retry_delay = retry_delay
        .filter(|d| *d > 0)
        .unwrap_or_else(|| defaults.retry_delay());
    let retry_limit = retry_limit
        .filter(|l| *l > 0)
        .unwrap_or_else(|| defaults.retry_limit());
    let retry_backoff = options.retry_backoff.unwrap_or(false) || defaults.retry_backoff();

    let retry_delay = if retry_backoff && retry_delay == 0 {
        1
    } else {
        retry_delay
    };
    let retry_limit = if retry_delay > 0 && retry_limit == 0 {
        1
    } else {
        retry_limit
    };

    Ok((retry_limit, retry_delay, retry_backoff))
}

struct Unit {
    name: &'static str,
    value: Option<i64>,
    seconds: u64,
}

impl Unit {
    fn new(name: &'static str, value: Option<i64>, seconds: u64) -> Self {
        Unit {
            name,
            value,
            seconds,
        }
    }

    fn duration(&self, value: i64) -> Result<Duration> {
        u64::try_from(value)
            .ok()
            .and_then(|v| v.checked_mul(self.seconds))
            .map(Duration::from_secs)
            .ok_or_else(|| Error::validation(format!("{} is out of range", self.name)))
    }
}

/// Every supplied unit must be at least 1. The first supplied unit, in order, wins.
fn first_unit_at_least_one(units: &[Unit]) -> Result<Option<Duration>> {
    for unit in units {
        if matches!(unit.value, Some(v) if v < 1) {
            return Err(Error::validation(format!("{} must be at least 1", unit.name)));
        }
    }

    units
        .iter()
        .find_map(|unit| unit.value.map(|v| unit.duration(v)))
        .transpose()
}

fn resolve_expiration(
    options: &JobOptions,
    defaults: &QueueDefaults,
    diagnostics: &Diagnostics,
) -> Result<Duration> {
    if options.legacy_expire_in.is_some() {
        diagnostics.emit(WarningKind::DeprecatedExpireIn, None, false);
    }

    let expire_in = first_unit_at_least_one(&[
        Unit::new("expireInHours", options.expire_in_hours, 60 * 60),
        Unit::new("expireInMinutes", options.expire_in_minutes, 60),
        Unit::new("expireInSeconds", options.expire_in_seconds, 1),
    ])?;

    Ok(expire_in.unwrap_or_else(|| defaults.expire_in()))
}

fn resolve_retention(options: &JobOptions, defaults: &QueueDefaults) -> Result<Retention> {
    let keep_for = first_unit_at_least_one(&[
        Unit::new("retentionDays", options.retention_days, 24 * 60 * 60),
        Unit::new("retentionHours", options.retention_hours, 60 * 60),
        Unit::new("retentionMinutes", options.retention_minutes, 60),
        Unit::new("retentionSeconds", options.retention_seconds, 1),
    ])?;

    Ok(Retention::For(
        keep_for.unwrap_or_else(|| defaults.keep_until()),
    ))
}

fn resolve_start_after(start_after: Option<&StartAfter>) -> Result<Option<StartTime>> {
    let resolved = match start_after {
        None => None,
        Some(StartAfter::At(time)) => Some(StartTime::At(*time)),
        Some(StartAfter::Seconds(seconds)) if seconds.is_finite() && *seconds > 0.0 => {
            let delay = Duration::try_from_secs_f64(*seconds)
                .map_err(|_| Error::validation("startAfter is out of range"))?;
            Some(StartTime::After(delay))
        }
        Some(StartAfter::Seconds(_)) => None,
        Some(StartAfter::Text(text)) => {
            if let Ok(time) = OffsetDateTime::parse(text, &Rfc3339) {
                Some(StartTime::At(time))
            } else if let Some(delay) = parse_interval(text) {
                Some(StartTime::After(delay))
            } else {
                event!(Level::DEBUG, start_after = %text, "unrecognized startAfter, starting immediately");
                None
            }
        }
        Some(StartAfter::Other(value)) => {
            event!(Level::DEBUG, start_after = %value, "unrecognized startAfter, starting immediately");
            None
        }
    };

    Ok(resolved)
}

/// Values of zero or less do not count as supplied.
fn resolve_singleton_seconds(options: &JobOptions) -> Result<Option<u64>> {
    let units = [
        Unit::new("singletonHours", options.singleton_hours, 60 * 60),
        Unit::new("singletonMinutes", options.singleton_minutes, 60),
        Unit::new("singletonSeconds", options.singleton_seconds, 1),
    ];

    units
        .iter()
        .find_map(|unit| {
            unit.value
                .filter(|v| *v > 0)
                .map(|v| unit.duration(v).map(|d| d.as_secs()))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use serde_json::json;
    use time::macros::datetime;

    use super::*;
    use crate::{diagnostics::Warning, SINGLETON_QUEUE_KEY};

    fn defaults() -> QueueDefaults {
        QueueDefaults::default()
    }

    fn resolve_options(options: JobOptions) -> Result<ResolvedJobOptions> {
        let request = JobRequest::from_parts("a_job", json!({}), options);
        resolve(&request, &defaults(), &Diagnostics::new())
    }

    #[test]
    fn send_email_scenario() {
        let request = JobRequest::from_json(json!({
            "name": "send-email",
            "data": { "to": "x" },
            "options": { "priority": 5, "retryLimit": 3, "retryDelay": 10 },
        }))
        .unwrap();

        let resolved = resolve(&request, &defaults(), &Diagnostics::new()).unwrap();

        assert_eq!(resolved.priority, 5);
        assert_eq!(resolved.retry_limit, 3);
        assert_eq!(resolved.retry_delay, 10);
        assert!(!resolved.retry_backoff);
        assert_eq!(format_interval(resolved.expire_in), "15 minutes");
        assert_eq!(resolved.keep_until, Retention::For(Duration::from_secs(14 * 86400)));
        assert_eq!(format_interval(Duration::from_secs(14 * 86400)), "14 days");
        assert_eq!(resolved.start_after, None);
        assert_eq!(resolved.singleton_key, None);
        assert_eq!(resolved.singleton_seconds, None);
        assert!(!resolved.on_complete);
    }

    #[test]
    fn resolution_is_deterministic_and_does_not_modify_request() {
        let request = JobRequest::from_parts(
            "a_job",
            json!({ "n": 1 }),
            JobOptions::new()
                .singleton_key("k")
                .use_singleton_queue(true)
                .expire_in_minutes(3)
                .retry_backoff(true),
        );
        let before = request.clone();

        let a = resolve(&request, &defaults(), &Diagnostics::new()).unwrap();
        let b = resolve(&request, &defaults(), &Diagnostics::new()).unwrap();

        assert_eq!(a, b);
        assert_eq!(request, before);
    }

    #[test]
    fn name_is_required() {
        let request = JobRequest::new("");
        let err = resolve(&request, &defaults(), &Diagnostics::new()).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn priority_defaults_to_zero() {
        assert_eq!(resolve_options(JobOptions::new()).unwrap().priority, 0);
        assert_eq!(
            resolve_options(JobOptions::new().priority(-3))
                .unwrap()
                .priority,
            -3
        );
    }

    mod retry {
        use super::*;

        #[test]
        fn backoff_forces_delay() {
            let resolved = resolve_options(JobOptions::new().retry_backoff(true)).unwrap();
            assert!(resolved.retry_backoff);
            assert_eq!(resolved.retry_delay, 1);
            assert_eq!(resolved.retry_limit, 1);
        }

        #[test]
        fn delay_forces_limit() {
            let resolved = resolve_options(JobOptions::new().retry_delay(5)).unwrap();
            assert_eq!(resolved.retry_delay, 5);
            assert_eq!(resolved.retry_limit, 1);
        }

        #[test]
        fn zero_delay_without_backoff() {
            let resolved = resolve_options(
                JobOptions::new().retry_delay(0).retry_backoff(false),
            )
            .unwrap();
            assert_eq!(resolved.retry_delay, 0);
            assert_eq!(resolved.retry_limit, 0);
            assert!(!resolved.retry_backoff);
        }

        #[test]
        fn negative_values_are_rejected() {
            assert!(resolve_options(JobOptions::new().retry_limit(-1))
                .unwrap_err()
                .is_validation());
            assert!(resolve_options(JobOptions::new().retry_delay(-5))
                .unwrap_err()
                .is_validation());
        }

        #[test]
        fn queue_defaults_fill_in() {
            let defaults = QueueDefaults::builder()
                .retry_limit(4)
                .retry_delay(30)
                .build()
                .unwrap();

            let request = JobRequest::new("a_job").options(JobOptions::new().retry_limit(0));
            let resolved = resolve(&request, &defaults, &Diagnostics::new()).unwrap();
            assert_eq!(resolved.retry_limit, 4);
            assert_eq!(resolved.retry_delay, 30);

            let request = JobRequest::new("a_job").options(JobOptions::new().retry_limit(2));
            let resolved = resolve(&request, &defaults, &Diagnostics::new()).unwrap();
            assert_eq!(resolved.retry_limit, 2);
        }

        #[test]
        fn queue_backoff_applies() {
            let defaults = QueueDefaults::builder().retry_backoff(true).build().unwrap();
            let request = JobRequest::new("a_job").options(JobOptions::new().retry_backoff(false));
            let resolved = resolve(&request, &defaults, &Diagnostics::new()).unwrap();
            assert!(resolved.retry_backoff);
            assert_eq!(resolved.retry_delay, 1);
        }
    }

    mod expiration {
        use super::*;

        #[test]
        fn hours_beat_minutes() {
            let resolved = resolve_options(
                JobOptions::new().expire_in_hours(1).expire_in_minutes(90),
            )
            .unwrap();
            assert_eq!(resolved.expire_in, Duration::from_secs(3600));
            assert_eq!(format_interval(resolved.expire_in), "1 hour");
        }

        #[test]
        fn minutes_beat_seconds() {
            let resolved = resolve_options(
                JobOptions::new().expire_in_minutes(2).expire_in_seconds(5),
            )
            .unwrap();
            assert_eq!(resolved.expire_in, Duration::from_secs(120));
        }

        #[test]
        fn seconds_alone() {
            let resolved = resolve_options(JobOptions::new().expire_in_seconds(5)).unwrap();
            assert_eq!(resolved.expire_in, Duration::from_secs(5));
        }

        #[test]
        fn every_supplied_unit_must_be_positive() {
            let err = resolve_options(JobOptions::new().expire_in_hours(1).expire_in_seconds(0))
                .unwrap_err();
            assert!(err.is_validation());
            assert!(err.to_string().contains("expireInSeconds"));

            assert!(resolve_options(JobOptions::new().expire_in_minutes(0)).is_err());
        }

        #[test]
        fn queue_default_then_builtin() {
            let defaults = QueueDefaults::builder()
                .expire_in(Duration::from_secs(42))
                .build()
                .unwrap();
            let resolved =
                resolve(&JobRequest::new("a_job"), &defaults, &Diagnostics::new()).unwrap();
            assert_eq!(resolved.expire_in, Duration::from_secs(42));

            let resolved = resolve_options(JobOptions::new()).unwrap();
            assert_eq!(resolved.expire_in, Duration::from_secs(15 * 60));
        }

        #[test]
        fn legacy_option_warns_once_and_is_ignored() {
            let seen = Arc::new(Mutex::new(Vec::<Warning>::new()));
            let diagnostics = {
                let seen = seen.clone();
                Diagnostics::with_listener(move |w| seen.lock().unwrap().push(w.clone()))
            };

            let mut options = JobOptions::new();
            options.legacy_expire_in = Some(json!("1 hour"));
            let request = JobRequest::new("a_job").options(options);

            for _ in 0..3 {
                let resolved = resolve(&request, &defaults(), &diagnostics).unwrap();
                assert_eq!(resolved.expire_in, Duration::from_secs(15 * 60));
            }

            let seen = seen.lock().unwrap();
            assert_eq!(seen.len(), 1);
            assert_eq!(seen[0].kind, WarningKind::DeprecatedExpireIn);
        }
    }

    mod retention {
        use super::*;

        #[test]
        fn days_win() {
            let resolved = resolve_options(
                JobOptions::new()
                    .retention_seconds(10)
                    .retention_minutes(10)
                    .retention_hours(10)
                    .retention_days(2),
            )
            .unwrap();
            assert_eq!(resolved.keep_until, Retention::For(Duration::from_secs(2 * 86400)));
        }

        #[test]
        fn hours_beat_minutes() {
            let resolved =
                resolve_options(JobOptions::new().retention_hours(3).retention_minutes(5)).unwrap();
            assert_eq!(resolved.keep_until, Retention::For(Duration::from_secs(3 * 3600)));
        }

        #[test]
        fn must_be_at_least_one() {
            assert!(resolve_options(JobOptions::new().retention_days(0))
                .unwrap_err()
                .is_validation());
            assert!(resolve_options(JobOptions::new().retention_seconds(-4)).is_err());
        }

        #[test]
        fn queue_default() {
            let defaults = QueueDefaults::builder()
                .keep_until(Duration::from_secs(600))
                .build()
                .unwrap();
            let resolved =
                resolve(&JobRequest::new("a_job"), &defaults, &Diagnostics::new()).unwrap();
            assert_eq!(resolved.keep_until, Retention::For(Duration::from_secs(600)));
        }

        #[test]
        fn out_of_range() {
            assert!(resolve_options(JobOptions::new().retention_days(i64::MAX))
                .unwrap_err()
                .is_validation());
        }
    }

    mod completion {
        use super::*;

        #[test]
        fn caller_then_queue_default() {
            assert!(!resolve_options(JobOptions::new()).unwrap().on_complete);
            assert!(resolve_options(JobOptions::new().on_complete(true))
                .unwrap()
                .on_complete);

            let defaults = QueueDefaults::builder().on_complete(true).build().unwrap();
            let resolved =
                resolve(&JobRequest::new("a_job"), &defaults, &Diagnostics::new()).unwrap();
            assert!(resolved.on_complete);

            let request = JobRequest::new("a_job").options(JobOptions::new().on_complete(false));
            let resolved = resolve(&request, &defaults, &Diagnostics::new()).unwrap();
            assert!(!resolved.on_complete);
        }
    }

    mod start_after {
        use super::*;

        fn start(value: StartAfter) -> Result<Option<StartTime>> {
            resolve_options(JobOptions::new().start_after(value)).map(|r| r.start_after)
        }

        #[test]
        fn absolute_time() {
            let at = datetime!(2024-05-01 10:00 UTC);
            assert_eq!(start(StartAfter::At(at)).unwrap(), Some(StartTime::At(at)));
        }

        #[test]
        fn positive_delay() {
            assert_eq!(
                start(StartAfter::Seconds(30.0)).unwrap(),
                Some(StartTime::After(Duration::from_secs(30)))
            );
            assert_eq!(
                start(StartAfter::Seconds(2.5)).unwrap(),
                Some(StartTime::After(Duration::from_millis(2500)))
            );
            assert_eq!(
                start(std::time::Duration::from_millis(500).into()).unwrap(),
                Some(StartTime::After(Duration::from_millis(500)))
            );
        }

        #[test]
        fn non_positive_delay_starts_immediately() {
            assert_eq!(start(StartAfter::Seconds(0.0)).unwrap(), None);
            assert_eq!(start(StartAfter::Seconds(-10.0)).unwrap(), None);
            assert_eq!(start(StartAfter::Seconds(f64::NAN)).unwrap(), None);
        }

        #[test]
        fn text_forms() {
            assert_eq!(
                start(StartAfter::Text("2024-05-01T10:00:00Z".to_string())).unwrap(),
                Some(StartTime::At(datetime!(2024-05-01 10:00 UTC)))
            );
            assert_eq!(
                start(StartAfter::Text("2 minutes".to_string())).unwrap(),
                Some(StartTime::After(Duration::from_secs(120)))
            );
        }

        #[test]
        fn unrecognized_values_start_immediately() {
            assert_eq!(start(StartAfter::Text("soon".to_string())).unwrap(), None);
            assert_eq!(start(StartAfter::Text("tomorrow-ish".to_string())).unwrap(), None);
            assert_eq!(start(StartAfter::Other(json!(true))).unwrap(), None);
            assert_eq!(start(StartAfter::Other(json!({}))).unwrap(), None);
        }

        #[test]
        fn unrecognized_json_starts_immediately() {
            for value in [json!(true), json!({}), json!([1]), json!("soon"), json!(-5)] {
                let request = JobRequest::from_json(json!({
                    "name": "a_job",
                    "options": { "startAfter": value },
                }))
                .unwrap();
                let resolved = resolve(&request, &QueueDefaults::default(), &Diagnostics::new())
                    .unwrap();
                assert_eq!(resolved.start_after, None);
            }
        }
    }

    mod singleton {
        use super::*;

        #[test]
        fn hours_beat_minutes_beat_seconds() {
            let resolved = resolve_options(
                JobOptions::new()
                    .singleton_hours(1)
                    .singleton_minutes(5)
                    .singleton_seconds(10),
            )
            .unwrap();
            assert_eq!(resolved.singleton_seconds, Some(3600));

            let resolved = resolve_options(
                JobOptions::new().singleton_minutes(5).singleton_seconds(10),
            )
            .unwrap();
            assert_eq!(resolved.singleton_seconds, Some(300));
        }

        #[test]
        fn non_positive_values_are_skipped() {
            let resolved = resolve_options(
                JobOptions::new().singleton_hours(0).singleton_seconds(10),
            )
            .unwrap();
            assert_eq!(resolved.singleton_seconds, Some(10));

            let resolved = resolve_options(JobOptions::new().singleton_seconds(-1)).unwrap();
            assert_eq!(resolved.singleton_seconds, None);
        }

        #[test]
        fn window_cannot_exceed_archive_interval() {
            let defaults = QueueDefaults::builder()
                .archive_interval(Duration::from_secs(3600))
                .build()
                .unwrap();
            let request =
                JobRequest::new("a_job").options(JobOptions::new().singleton_seconds(7200));

            let err = resolve(&request, &defaults, &Diagnostics::new()).unwrap_err();
            assert!(err.is_validation());
            let message = err.to_string();
            assert!(message.contains("7200"), "{message}");
            assert!(message.contains("3600"), "{message}");

            let request =
                JobRequest::new("a_job").options(JobOptions::new().singleton_seconds(3600));
            assert!(resolve(&request, &defaults, &Diagnostics::new()).is_ok());
        }

        #[test]
        fn window_from_hours_is_checked() {
            let defaults = QueueDefaults::builder()
                .archive_interval(Duration::from_secs(3600))
                .build()
                .unwrap();
            let request = JobRequest::new("a_job").options(JobOptions::new().singleton_hours(2));
            assert!(resolve(&request, &defaults, &Diagnostics::new()).is_err());
        }

        #[test]
        fn singleton_queue_rewrites_key() {
            let resolved = resolve_options(
                JobOptions::new()
                    .singleton_key("report")
                    .use_singleton_queue(true),
            )
            .unwrap();
            assert_eq!(
                resolved.singleton_key,
                Some(format!("{SINGLETON_QUEUE_KEY}report"))
            );

            let resolved = resolve_options(JobOptions::new().singleton_key("report")).unwrap();
            assert_eq!(resolved.singleton_key.as_deref(), Some("report"));
        }

        #[test]
        fn next_slot_passes_through() {
            let resolved = resolve_options(
                JobOptions::new()
                    .singleton_seconds(10)
                    .singleton_next_slot(true),
            )
            .unwrap();
            assert!(resolved.singleton_next_slot);
        }
    }

    mod batch {
        use super::*;

        #[test]
        fn rewrites_singleton_queue_keys_only() {
            let mut queued = BatchJob::new("a_job");
            queued.singleton_key = Some("k".to_string());
            queued.use_singleton_queue = Some(true);
            queued.expire_in_seconds = Some(5);

            let mut plain = BatchJob::new("a_job");
            plain.singleton_key = Some("k".to_string());

            let jobs = resolve_batch(vec![queued, plain]).unwrap();
            assert_eq!(
                jobs[0].singleton_key,
                Some(format!("{SINGLETON_QUEUE_KEY}k"))
            );
            assert_eq!(jobs[0].use_singleton_queue, None);
            assert_eq!(jobs[0].expire_in_seconds, Some(5));
            assert_eq!(jobs[1].singleton_key.as_deref(), Some("k"));
        }

        #[test]
        fn requires_names() {
            let err = resolve_batch(vec![BatchJob::new("a"), BatchJob::default()]).unwrap_err();
            assert!(err.to_string().contains("job 1"));
        }
    }
}

//! Scheduling and bounded-concurrency dispatch of cache refreshes (spec
//! §4.5). Grounded on
//! `fraiseql-observers::job_queue::executor::JobExecutor`'s worker-pool
//! shape (`JoinSet` + a concurrency cap), adapted from a job queue to a
//! fixed set of per-endpoint schedules.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info};

use flapi_error::GatewayError;

/// A single endpoint's refresh schedule and the closure that performs it.
pub struct ScheduledJob {
    pub key: String,
    pub interval: Duration,
    pub next_run: Instant,
}

impl ScheduledJob {
    #[must_use]
    pub fn new(key: impl Into<String>, interval: Duration, now: Instant) -> Self {
        Self { key: key.into(), interval, next_run: now + interval }
    }

    fn is_due(&self, now: Instant) -> bool {
        now >= self.next_run
    }

    fn reschedule(&mut self, now: Instant) {
        self.next_run = now + self.interval;
    }
}

/// Returns the keys of jobs due at `now`, advancing their `next_run`.
pub fn due_jobs(jobs: &mut [ScheduledJob], now: Instant) -> Vec<String> {
    let mut due = Vec::new();
    for job in jobs.iter_mut() {
        if job.is_due(now) {
            due.push(job.key.clone());
            job.reschedule(now);
        }
    }
    due
}

/// Runs at most `max_concurrency` refresh tasks at a time.
pub struct CacheScheduler {
    max_concurrency: usize,
}

impl CacheScheduler {
    #[must_use]
    pub fn new(max_concurrency: usize) -> Self {
        Self { max_concurrency: max_concurrency.max(1) }
    }

    /// Runs `task(key)` for every entry in `keys`, bounded to
    /// `max_concurrency` in flight at once, and returns the keys whose task
    /// failed along with the error.
    pub async fn dispatch<F, Fut>(&self, keys: Vec<String>, task: F) -> Vec<(String, GatewayError)>
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<(), GatewayError>> + Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let task = Arc::new(task);
        let mut join_set = JoinSet::new();

        for key in keys {
            let permit = semaphore.clone().acquire_owned().await.expect("semaphore not closed");
            let task = task.clone();
            let key_for_log = key.clone();
            join_set.spawn(async move {
                let _permit = permit;
                let result = task(key.clone()).await;
                if let Err(ref e) = result {
                    error!(endpoint = %key_for_log, error = %e, "cache refresh failed");
                } else {
                    info!(endpoint = %key_for_log, "cache refresh dispatched");
                }
                (key, result)
            });
        }

        let mut failures = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            if let Ok((key, Err(e))) = joined {
                failures.push((key, e));
            }
        }
        failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn due_jobs_advances_next_run() {
        let now = Instant::now();
        let mut jobs = vec![ScheduledJob { key: "a".into(), interval: Duration::from_secs(60), next_run: now }];
        let due = due_jobs(&mut jobs, now);
        assert_eq!(due, vec!["a".to_string()]);
        assert!(jobs[0].next_run > now);
    }

    #[test]
    fn not_yet_due_jobs_are_skipped() {
        let now = Instant::now();
        let mut jobs =
            vec![ScheduledJob { key: "a".into(), interval: Duration::from_secs(60), next_run: now + Duration::from_secs(30) }];
        assert!(due_jobs(&mut jobs, now).is_empty());
    }

    #[tokio::test]
    async fn dispatch_runs_all_tasks_and_reports_failures() {
        let scheduler = CacheScheduler::new(2);
        let failures = scheduler
            .dispatch(vec!["ok".to_string(), "bad".to_string()], |key| async move {
                if key == "bad" {
                    Err(GatewayError::database("boom"))
                } else {
                    Ok(())
                }
            })
            .await;
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "bad");
    }

    #[tokio::test]
    async fn dispatch_respects_concurrency_cap() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_observed = Arc::new(AtomicUsize::new(0));
        let scheduler = CacheScheduler::new(2);

        let in_flight_clone = in_flight.clone();
        let max_observed_clone = max_observed.clone();
        scheduler
            .dispatch(vec!["a".into(), "b".into(), "c".into(), "d".into()], move |_key| {
                let in_flight = in_flight_clone.clone();
                let max_observed = max_observed_clone.clone();
                async move {
                    let current = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    max_observed.fetch_max(current, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .await;

        assert!(max_observed.load(Ordering::SeqCst) <= 2);
    }
}

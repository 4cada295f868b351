//! Background jobs on tokio-cron-scheduler.
//!
//! Cron jobs fire on UTC wall-clock times, interval jobs repeat every period.
//! Every firing runs the job body to completion, logs any failure and leaves
//! the other jobs alone. Bodies are tracked so [`Scheduler::stop`] can wait
//! for whatever is still running.
//!
//! ```text
//! JobScheduler
//!     ├─► cron "0 0 0 * * *"    ── run ── log failure
//!     ├─► cron "0 0 0 * * Wed"  ── run ── log failure
//!     └─► repeated every period ── run ── log failure
//! ```

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::FutureExt;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::task::TaskTracker;
use tracing::{error, info};

/// Every day at 00:00 UTC.
pub const DAILY_AT_MIDNIGHT_UTC: &str = "0 0 0 * * *";
/// Wednesdays at 00:00 UTC.
pub const WEDNESDAY_AT_MIDNIGHT_UTC: &str = "0 0 0 * * Wed";

#[async_trait]
pub trait ScheduledJob: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Six-field cron expression (seconds first), evaluated in UTC.
    Cron(&'static str),
    /// Fixed interval. `run_at_start` also fires once as soon as the
    /// scheduler starts.
    Every {
        period: Duration,
        run_at_start: bool,
    },
}

#[derive(Clone)]
pub struct Scheduler {
    inner: JobScheduler,
    tracker: TaskTracker,
    startup: Vec<Arc<dyn ScheduledJob>>,
}

impl Scheduler {
    pub async fn new() -> Result<Self> {
        let inner = JobScheduler::new()
            .await
            .context("Failed to create job scheduler")?;
        Ok(Self {
            inner,
            tracker: TaskTracker::new(),
            startup: Vec::new(),
        })
    }

    pub async fn add(&mut self, schedule: Schedule, job: Arc<dyn ScheduledJob>) -> Result<()> {
        let name = job.name();
        info!(job = name, schedule = ?schedule, "Scheduling job");

        let cron_job = match schedule {
            Schedule::Cron(expression) => {
                let tracker = self.tracker.clone();
                Job::new_async(expression, move |_uuid, _lock| {
                    let (job, tracker) = (job.clone(), tracker.clone());
                    Box::pin(async move {
                        tracker.track_future(run_job(job)).await;
                    })
                })
                .with_context(|| format!("Invalid schedule {expression:?} for {name}"))?
            }
            Schedule::Every {
                period,
                run_at_start,
            } => {
                if run_at_start {
                    self.startup.push(job.clone());
                }
                let tracker = self.tracker.clone();
                Job::new_repeated_async(period, move |_uuid, _lock| {
                    let (job, tracker) = (job.clone(), tracker.clone());
                    Box::pin(async move {
                        tracker.track_future(run_job(job)).await;
                    })
                })
                .with_context(|| format!("Invalid interval for {name}"))?
            }
        };

        self.inner
            .add(cron_job)
            .await
            .context("Failed to add scheduled job")?;
        Ok(())
    }

    /// Start firing. Interval jobs marked `run_at_start` run once right away.
    pub async fn start(&mut self) -> Result<()> {
        for job in self.startup.drain(..) {
            self.tracker.spawn(run_job(job));
        }
        self.inner
            .start()
            .await
            .context("Failed to start job scheduler")?;
        Ok(())
    }

    /// Stop firing and wait for every job body still in flight.
    pub async fn stop(&self) {
        let mut inner = self.inner.clone();
        if let Err(e) = inner.shutdown().await {
            error!(error = %e, "Job scheduler shutdown failed");
        }
        self.tracker.close();
        self.tracker.wait().await;
        info!("Scheduler stopped");
    }
}

async fn run_job(job: Arc<dyn ScheduledJob>) {
    info!(job = job.name(), "Running scheduled job");
    match AssertUnwindSafe(job.run()).catch_unwind().await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(job = job.name(), error = %e, "Scheduled job failed"),
        Err(_) => error!(job = job.name(), "Scheduled job panicked"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingJob {
        runs: AtomicUsize,
        finished: AtomicUsize,
        delay: Duration,
        fail: bool,
    }

    impl CountingJob {
        fn new(fail: bool) -> Arc<Self> {
            Self::slow(Duration::ZERO, fail)
        }

        fn slow(delay: Duration, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                runs: AtomicUsize::new(0),
                finished: AtomicUsize::new(0),
                delay,
                fail,
            })
        }

        fn runs(&self) -> usize {
            self.runs.load(Ordering::SeqCst)
        }

        fn finished(&self) -> usize {
            self.finished.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ScheduledJob for CountingJob {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn run(&self) -> Result<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.finished.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("boom");
            }
            Ok(())
        }
    }

    struct PanickingJob;

    #[async_trait]
    impl ScheduledJob for PanickingJob {
        fn name(&self) -> &'static str {
            "panicking"
        }

        async fn run(&self) -> Result<()> {
            panic!("job bug");
        }
    }

    const HOUR: Duration = Duration::from_secs(3600);

    #[tokio::test(flavor = "multi_thread")]
    async fn test_cron_expressions_are_accepted() {
        let mut scheduler = Scheduler::new().await.unwrap();
        scheduler
            .add(Schedule::Cron(DAILY_AT_MIDNIGHT_UTC), CountingJob::new(false))
            .await
            .unwrap();
        scheduler
            .add(Schedule::Cron(WEDNESDAY_AT_MIDNIGHT_UTC), CountingJob::new(false))
            .await
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_invalid_cron_expression_is_rejected() {
        let mut scheduler = Scheduler::new().await.unwrap();
        let err = scheduler
            .add(Schedule::Cron("every midnight"), CountingJob::new(false))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Invalid schedule"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_run_at_start_fires_once_on_start() {
        let mut scheduler = Scheduler::new().await.unwrap();
        let eager = CountingJob::new(false);
        let lazy = CountingJob::new(false);
        let every = |run_at_start| Schedule::Every {
            period: HOUR,
            run_at_start,
        };
        scheduler.add(every(true), eager.clone()).await.unwrap();
        scheduler.add(every(false), lazy.clone()).await.unwrap();

        scheduler.start().await.unwrap();
        scheduler.stop().await;

        assert_eq!(eager.runs(), 1);
        assert_eq!(lazy.runs(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_stop_waits_for_running_job_body() {
        let mut scheduler = Scheduler::new().await.unwrap();
        let job = CountingJob::slow(Duration::from_millis(200), false);
        scheduler
            .add(
                Schedule::Every {
                    period: HOUR,
                    run_at_start: true,
                },
                job.clone(),
            )
            .await
            .unwrap();

        scheduler.start().await.unwrap();
        scheduler.stop().await;

        assert_eq!(job.finished(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_failing_and_panicking_jobs_do_not_affect_others() {
        let mut scheduler = Scheduler::new().await.unwrap();
        let failing = CountingJob::new(true);
        let healthy = CountingJob::new(false);
        let every = Schedule::Every {
            period: HOUR,
            run_at_start: true,
        };
        scheduler.add(every, failing.clone()).await.unwrap();
        scheduler.add(every, Arc::new(PanickingJob)).await.unwrap();
        scheduler.add(every, healthy.clone()).await.unwrap();

        scheduler.start().await.unwrap();
        scheduler.stop().await;

        assert_eq!(failing.runs(), 1);
        assert_eq!(healthy.runs(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_interval_job_repeats() {
        let mut scheduler = Scheduler::new().await.unwrap();
        let job = CountingJob::new(false);
        scheduler
            .add(
                Schedule::Every {
                    period: Duration::from_secs(1),
                    run_at_start: false,
                },
                job.clone(),
            )
            .await
            .unwrap();

        scheduler.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(3500)).await;
        scheduler.stop().await;

        assert!(job.runs() >= 1);
    }
}

//! Scheduled background tasks.
//!
//! Jobs either write directly (grants, maintenance) or publish an event that
//! another subsystem reacts to (the vote winner starts an import).
//!
//! ```text
//! JobScheduler
//!     ├─► 00:00 UTC daily      ── DailyVoteGrantJob
//!     ├─► Wednesday 00:00 UTC  ── WeeklyTicketGrantJob
//!     ├─► every 6h             ── VotingWinnerJob ──► DailyVoteWinnerSelected
//!     ├─► hourly (and at boot) ── SubscriptionExpiryJob
//!     └─► every 24h            ── GrantLogCleanupJob
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use sqlx::PgPool;

use super::scheduler::{DAILY_AT_MIDNIGHT_UTC, WEDNESDAY_AT_MIDNIGHT_UTC};
use super::{EventBus, Schedule, Scheduler};
use crate::domains::grants::{DailyVoteGrantJob, GrantLog, GrantSummary, PgGrantStore, WeeklyTicketGrantJob};
use crate::domains::import_runs::PgRunStore;
use crate::domains::maintenance::{GrantLogCleanupJob, SubscriptionExpiryJob};
use crate::domains::voting::VotingWinnerJob;

const HOUR: Duration = Duration::from_secs(60 * 60);

/// Running scheduler plus handles for triggering jobs by hand.
pub struct ScheduledTasks {
    scheduler: Scheduler,
    daily_vote: Arc<DailyVoteGrantJob>,
}

impl ScheduledTasks {
    /// Run today's daily vote grant outside the schedule.
    pub async fn run_daily_vote_job_now(&self) -> Result<GrantSummary> {
        self.daily_vote
            .run_for(chrono::Utc::now().date_naive())
            .await
    }

    pub async fn daily_grant_status(&self) -> Result<Option<GrantLog>> {
        self.daily_vote.status().await
    }

    pub async fn stop(&self) {
        self.scheduler.stop().await;
    }
}

/// Start all scheduled tasks
pub async fn start_scheduler(pool: PgPool, bus: EventBus) -> Result<ScheduledTasks> {
    let mut scheduler = Scheduler::new().await?;
    let grants = Arc::new(PgGrantStore::new(pool.clone()));

    let daily_vote = Arc::new(DailyVoteGrantJob::new(grants.clone()));
    scheduler
        .add(Schedule::Cron(DAILY_AT_MIDNIGHT_UTC), daily_vote.clone())
        .await?;

    scheduler
        .add(
            Schedule::Cron(WEDNESDAY_AT_MIDNIGHT_UTC),
            Arc::new(WeeklyTicketGrantJob::new(grants)),
        )
        .await?;

    let winner = VotingWinnerJob::new(Arc::new(PgRunStore::new(pool.clone())), bus);
    scheduler
        .add(
            Schedule::Every {
                period: 6 * HOUR,
                run_at_start: false,
            },
            Arc::new(winner),
        )
        .await?;

    scheduler
        .add(
            Schedule::Every {
                period: HOUR,
                run_at_start: true,
            },
            Arc::new(SubscriptionExpiryJob::new(pool.clone())),
        )
        .await?;

    scheduler
        .add(
            Schedule::Every {
                period: 24 * HOUR,
                run_at_start: false,
            },
            Arc::new(GrantLogCleanupJob::new(pool)),
        )
        .await?;

    scheduler.start().await?;

    tracing::info!(
        "Scheduled tasks started (daily votes at midnight UTC, weekly tickets on Wednesday, voting winner every 6h)"
    );
    Ok(ScheduledTasks {
        scheduler,
        daily_vote,
    })
}

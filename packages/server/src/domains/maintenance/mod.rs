//! Housekeeping jobs: subscription expiry and grant log retention.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::info;

use crate::domains::grants::{GrantKind, GrantLog};
use crate::kernel::ScheduledJob;

/// Daily grant logs older than this many days are removed.
pub const GRANT_LOG_RETENTION_DAYS: i32 = 30;

/// Flips active subscriptions whose end date has passed to `expired`.
pub struct SubscriptionExpiryJob {
    pool: PgPool,
}

impl SubscriptionExpiryJob {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn expire(&self) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE subscriptions SET status = 'expired', updated_at = NOW() \
             WHERE status = 'active' AND ends_at < NOW()",
        )
        .execute(&self.pool)
        .await
        .context("Failed to expire subscriptions")?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl ScheduledJob for SubscriptionExpiryJob {
    fn name(&self) -> &'static str {
        "subscription_expiry"
    }

    async fn run(&self) -> Result<()> {
        let expired = self.expire().await?;
        if expired > 0 {
            info!(expired, "Expired subscriptions");
        }
        Ok(())
    }
}

pub struct GrantLogCleanupJob {
    pool: PgPool,
}

impl GrantLogCleanupJob {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn cleanup(&self) -> Result<u64> {
        GrantLog::prune(GrantKind::DailyVote, GRANT_LOG_RETENTION_DAYS, &self.pool).await
    }
}

#[async_trait]
impl ScheduledJob for GrantLogCleanupJob {
    fn name(&self) -> &'static str {
        "grant_log_cleanup"
    }

    async fn run(&self) -> Result<()> {
        let removed = self.cleanup().await?;
        info!(removed, "Old daily grant logs removed");
        Ok(())
    }
}

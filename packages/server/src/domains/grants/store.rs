//! Persistence seam for the grant jobs.

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;

use super::models::{GrantKind, GrantLog, GrantUser, TicketGrant, TicketLedger};

#[async_trait]
pub trait GrantStore: Send + Sync {
    /// Page of eligible users ordered by id.
    async fn user_batch(&self, limit: i64, offset: i64) -> Result<Vec<GrantUser>>;
    /// Apply a ledger write. Returns false when its idempotency key was already used.
    async fn apply(&self, grant: &TicketGrant) -> Result<bool>;
    async fn start_log(&self, kind: GrantKind, date: NaiveDate) -> Result<()>;
    async fn complete_log(
        &self,
        kind: GrantKind,
        date: NaiveDate,
        users_processed: i32,
        tickets_granted: i32,
    ) -> Result<()>;
    async fn fail_log(&self, kind: GrantKind, date: NaiveDate, error: &str) -> Result<()>;
    async fn latest_log(&self, kind: GrantKind) -> Result<Option<GrantLog>>;
}

#[derive(Clone)]
pub struct PgGrantStore {
    pool: PgPool,
}

impl PgGrantStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GrantStore for PgGrantStore {
    async fn user_batch(&self, limit: i64, offset: i64) -> Result<Vec<GrantUser>> {
        GrantUser::batch(limit, offset, &self.pool).await
    }

    async fn apply(&self, grant: &TicketGrant) -> Result<bool> {
        TicketLedger::apply(grant, &self.pool).await
    }

    async fn start_log(&self, kind: GrantKind, date: NaiveDate) -> Result<()> {
        GrantLog::start(kind, date, &self.pool).await
    }

    async fn complete_log(
        &self,
        kind: GrantKind,
        date: NaiveDate,
        users_processed: i32,
        tickets_granted: i32,
    ) -> Result<()> {
        GrantLog::complete(kind, date, users_processed, tickets_granted, &self.pool).await
    }

    async fn fail_log(&self, kind: GrantKind, date: NaiveDate, error: &str) -> Result<()> {
        GrantLog::fail(kind, date, error, &self.pool).await
    }

    async fn latest_log(&self, kind: GrantKind) -> Result<Option<GrantLog>> {
        GrantLog::latest(kind, &self.pool).await
    }
}

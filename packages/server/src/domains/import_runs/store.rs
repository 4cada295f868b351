//! Persistence seams used by the orchestrator.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;

use super::models::{ImportRun, ImportRunCookie, ImportRunStatus, Proposal, RunOutcome};
use crate::common::{ImportRunId, NovelId, ProposalId};
use crate::domains::importing::Checkpoint;

#[async_trait]
pub trait ImportRunStore: Send + Sync {
    /// Create the run as `running`, or mark an existing run `running` again.
    /// A pending `pause_requested` is left in place.
    async fn create(&self, id: ImportRunId, proposal_id: ProposalId, importer_name: &str)
        -> Result<ImportRun>;
    async fn get_by_id(&self, id: ImportRunId) -> Result<Option<ImportRun>>;
    async fn set_status(&self, id: ImportRunId, status: ImportRunStatus) -> Result<()>;
    async fn update_progress(
        &self,
        id: ImportRunId,
        current: usize,
        total: usize,
        checkpoint: &Checkpoint,
    ) -> Result<()>;
    async fn set_novel_id(&self, id: ImportRunId, novel_id: NovelId) -> Result<()>;
    async fn set_result(&self, id: ImportRunId, outcome: RunOutcome) -> Result<()>;
    async fn list(&self, status: Option<ImportRunStatus>, limit: Option<i64>) -> Result<Vec<ImportRun>>;
}

#[async_trait]
pub trait RunCookieStore: Send + Sync {
    async fn get_by_run_id(&self, run_id: ImportRunId) -> Result<Option<String>>;
    async fn upsert(&self, run_id: ImportRunId, cookie_header: &str) -> Result<()>;
    async fn delete(&self, run_id: ImportRunId) -> Result<()>;
}

#[async_trait]
pub trait ProposalStore: Send + Sync {
    async fn get_proposal_by_id(&self, id: ProposalId) -> Result<Option<Proposal>>;
    async fn set_proposal_novel_id(&self, id: ProposalId, novel_id: NovelId) -> Result<()>;
    /// Move the top voting proposal to `accepted` and return it.
    async fn accept_top_voting(&self) -> Result<Option<Proposal>>;
}

fn to_i32(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

/// Postgres-backed implementation of all three run stores.
#[derive(Clone)]
pub struct PgRunStore {
    pool: PgPool,
}

impl PgRunStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ImportRunStore for PgRunStore {
    async fn create(
        &self,
        id: ImportRunId,
        proposal_id: ProposalId,
        importer_name: &str,
    ) -> Result<ImportRun> {
        ImportRun::start(id, proposal_id, importer_name, &self.pool).await
    }

    async fn get_by_id(&self, id: ImportRunId) -> Result<Option<ImportRun>> {
        ImportRun::find_by_id(id, &self.pool).await
    }

    async fn set_status(&self, id: ImportRunId, status: ImportRunStatus) -> Result<()> {
        ImportRun::set_status(id, status, &self.pool).await
    }

    async fn update_progress(
        &self,
        id: ImportRunId,
        current: usize,
        total: usize,
        checkpoint: &Checkpoint,
    ) -> Result<()> {
        ImportRun::update_progress(id, to_i32(current), to_i32(total), checkpoint.encode(), &self.pool)
            .await
    }

    async fn set_novel_id(&self, id: ImportRunId, novel_id: NovelId) -> Result<()> {
        ImportRun::set_novel_id(id, novel_id, &self.pool).await
    }

    async fn set_result(&self, id: ImportRunId, outcome: RunOutcome) -> Result<()> {
        ImportRun::set_result(id, &outcome, &self.pool).await
    }

    async fn list(&self, status: Option<ImportRunStatus>, limit: Option<i64>) -> Result<Vec<ImportRun>> {
        ImportRun::list(status, limit, &self.pool).await
    }
}

#[async_trait]
impl RunCookieStore for PgRunStore {
    async fn get_by_run_id(&self, run_id: ImportRunId) -> Result<Option<String>> {
        Ok(ImportRunCookie::find_by_run(run_id, &self.pool)
            .await?
            .map(|c| c.cookie_header))
    }

    async fn upsert(&self, run_id: ImportRunId, cookie_header: &str) -> Result<()> {
        ImportRunCookie::upsert(run_id, cookie_header, &self.pool).await
    }

    async fn delete(&self, run_id: ImportRunId) -> Result<()> {
        ImportRunCookie::delete(run_id, &self.pool).await
    }
}

#[async_trait]
impl ProposalStore for PgRunStore {
    async fn get_proposal_by_id(&self, id: ProposalId) -> Result<Option<Proposal>> {
        Proposal::find_by_id(id, &self.pool).await
    }

    async fn set_proposal_novel_id(&self, id: ProposalId, novel_id: NovelId) -> Result<()> {
        Proposal::set_novel_id(id, novel_id, &self.pool).await
    }

    async fn accept_top_voting(&self) -> Result<Option<Proposal>> {
        let Some(top) = Proposal::find_top_voting(&self.pool).await? else {
            return Ok(None);
        };
        if !Proposal::mark_accepted(top.id, &self.pool).await? {
            return Ok(None);
        }
        Ok(Some(top))
    }
}

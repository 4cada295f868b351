use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::common::{ImportRunId, NovelId, ProposalId};

pub const DEFAULT_LIST_LIMIT: i64 = 50;
pub const MAX_LIST_LIMIT: i64 = 200;

/// created -> running -> {succeeded | failed | cancelled}
/// running -> pause_requested -> paused -> running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "import_run_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ImportRunStatus {
    Created,
    Running,
    PauseRequested,
    Paused,
    Succeeded,
    Failed,
    Cancelled,
}

impl ImportRunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportRunStatus::Created => "created",
            ImportRunStatus::Running => "running",
            ImportRunStatus::PauseRequested => "pause_requested",
            ImportRunStatus::Paused => "paused",
            ImportRunStatus::Succeeded => "succeeded",
            ImportRunStatus::Failed => "failed",
            ImportRunStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ImportRunStatus::Succeeded | ImportRunStatus::Failed | ImportRunStatus::Cancelled
        )
    }

    /// Only suspended runs can be resumed.
    pub fn is_resumable(&self) -> bool {
        matches!(self, ImportRunStatus::Paused | ImportRunStatus::PauseRequested)
    }
}

impl std::fmt::Display for ImportRunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ImportRunStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "created" => Ok(ImportRunStatus::Created),
            "running" => Ok(ImportRunStatus::Running),
            "pause_requested" => Ok(ImportRunStatus::PauseRequested),
            "paused" => Ok(ImportRunStatus::Paused),
            "succeeded" => Ok(ImportRunStatus::Succeeded),
            "failed" => Ok(ImportRunStatus::Failed),
            "cancelled" => Ok(ImportRunStatus::Cancelled),
            _ => Err(anyhow::anyhow!("Invalid import run status: {}", s)),
        }
    }
}

/// One attempt-lineage of importing a single proposal.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ImportRun {
    pub id: ImportRunId,
    pub proposal_id: ProposalId,
    pub importer_name: String,
    pub status: ImportRunStatus,
    pub checkpoint: Option<serde_json::Value>,
    pub progress_current: i32,
    pub progress_total: i32,
    pub novel_id: Option<NovelId>,
    pub error_message: Option<String>,
    pub cloudflare_blocked: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Terminal (or paused) outcome written by `set_result`.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub status: ImportRunStatus,
    pub novel_id: Option<NovelId>,
    pub error_message: Option<String>,
    pub cloudflare_blocked: bool,
}

pub fn clamp_list_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT)
}

impl ImportRun {
    /// Insert the run as `running`, or flip an existing row back to
    /// `running` keeping its checkpoint and progress. A `pause_requested`
    /// written after the run was registered survives, so the task still
    /// ends `paused` once it sees the cancellation.
    pub async fn start(
        id: ImportRunId,
        proposal_id: ProposalId,
        importer_name: &str,
        pool: &PgPool,
    ) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO import_runs (id, proposal_id, importer_name, status, started_at)
            VALUES ($1, $2, $3, 'running', NOW())
            ON CONFLICT (id) DO UPDATE SET
                status = CASE
                    WHEN import_runs.status = 'pause_requested' THEN import_runs.status
                    ELSE 'running'
                END,
                importer_name = EXCLUDED.importer_name,
                error_message = NULL,
                cloudflare_blocked = false,
                finished_at = NULL,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(proposal_id)
        .bind(importer_name)
        .fetch_one(pool)
        .await
        .context("Failed to start import run")
    }

    pub async fn find_by_id(id: ImportRunId, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM import_runs WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("Failed to load import run")
    }

    pub async fn set_status(id: ImportRunId, status: ImportRunStatus, pool: &PgPool) -> Result<()> {
        sqlx::query("UPDATE import_runs SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(pool)
            .await
            .context("Failed to set import run status")?;
        Ok(())
    }

    pub async fn update_progress(
        id: ImportRunId,
        current: i32,
        total: i32,
        checkpoint: serde_json::Value,
        pool: &PgPool,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE import_runs
            SET progress_current = $2, progress_total = $3, checkpoint = $4, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(current)
        .bind(total)
        .bind(checkpoint)
        .execute(pool)
        .await
        .context("Failed to update import run progress")?;
        Ok(())
    }

    pub async fn set_novel_id(id: ImportRunId, novel_id: NovelId, pool: &PgPool) -> Result<()> {
        sqlx::query("UPDATE import_runs SET novel_id = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(novel_id)
            .execute(pool)
            .await
            .context("Failed to set import run novel")?;
        Ok(())
    }

    /// A missing `novel_id` keeps whatever the run already recorded.
    pub async fn set_result(id: ImportRunId, outcome: &RunOutcome, pool: &PgPool) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE import_runs
            SET status = $2,
                novel_id = COALESCE($3, novel_id),
                error_message = $4,
                cloudflare_blocked = $5,
                finished_at = NOW(),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(outcome.status)
        .bind(outcome.novel_id)
        .bind(&outcome.error_message)
        .bind(outcome.cloudflare_blocked)
        .execute(pool)
        .await
        .context("Failed to set import run result")?;
        Ok(())
    }

    /// Newest first.
    pub async fn list(status: Option<ImportRunStatus>, limit: Option<i64>, pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM import_runs
            WHERE ($1::import_run_status IS NULL OR status = $1)
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(status)
        .bind(clamp_list_limit(limit))
        .fetch_all(pool)
        .await
        .context("Failed to list import runs")
    }
}

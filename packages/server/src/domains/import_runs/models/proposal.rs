use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::common::{NovelId, ProposalId};

pub const PROPOSAL_VOTING: &str = "voting";
pub const PROPOSAL_ACCEPTED: &str = "accepted";

/// User-submitted request to add a novel. Owned by the voting subsystem;
/// ingestion reads it and links the imported novel back.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Proposal {
    pub id: ProposalId,
    pub original_link: String,
    pub status: String,
    pub novel_id: Option<NovelId>,
    pub vote_score: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Proposal {
    pub async fn find_by_id(id: ProposalId, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM novel_proposals WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("Failed to load proposal")
    }

    pub async fn set_novel_id(id: ProposalId, novel_id: NovelId, pool: &PgPool) -> Result<()> {
        let result = sqlx::query(
            "UPDATE novel_proposals SET novel_id = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(novel_id)
        .execute(pool)
        .await
        .context("Failed to link proposal to novel")?;
        if result.rows_affected() == 0 {
            anyhow::bail!("proposal {} not found", id);
        }
        Ok(())
    }

    /// Highest-scoring proposal still in voting; ties go to the oldest.
    pub async fn find_top_voting(pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM novel_proposals
            WHERE status = $1
            ORDER BY vote_score DESC, created_at ASC
            LIMIT 1
            "#,
        )
        .bind(PROPOSAL_VOTING)
        .fetch_optional(pool)
        .await
        .context("Failed to load top proposal")
    }

    /// Returns false when the proposal already left the voting state.
    pub async fn mark_accepted(id: ProposalId, pool: &PgPool) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE novel_proposals SET status = $2, updated_at = NOW() WHERE id = $1 AND status = $3",
        )
        .bind(id)
        .bind(PROPOSAL_ACCEPTED)
        .bind(PROPOSAL_VOTING)
        .execute(pool)
        .await
        .context("Failed to accept proposal")?;
        Ok(result.rows_affected() == 1)
    }
}

//! Rows the ingestion code reads but never creates.

use anyhow::Result;
use chrono::{Duration, Utc};
use ingest_core::common::{ProposalId, UserId};
use sqlx::PgPool;

pub async fn create_proposal(pool: &PgPool, original_link: &str, vote_score: i64) -> Result<ProposalId> {
    let id = ProposalId::new();
    sqlx::query(
        "INSERT INTO novel_proposals (id, original_link, status, vote_score) VALUES ($1, $2, 'voting', $3)",
    )
    .bind(id)
    .bind(original_link)
    .bind(vote_score)
    .execute(pool)
    .await?;
    Ok(id)
}

pub async fn create_user(pool: &PgPool, level: i32, banned: bool) -> Result<UserId> {
    let id = UserId::new();
    sqlx::query("INSERT INTO users (id, is_banned) VALUES ($1, $2)")
        .bind(id)
        .bind(banned)
        .execute(pool)
        .await?;
    sqlx::query("INSERT INTO user_xp (user_id, level) VALUES ($1, $2)")
        .bind(id)
        .bind(level)
        .execute(pool)
        .await?;
    Ok(id)
}

/// Subscription ending `days` from now; negative values are already over.
pub async fn create_subscription(pool: &PgPool, user_id: UserId, plan_code: &str, days: i64) -> Result<()> {
    sqlx::query("INSERT INTO subscriptions (user_id, plan_code, status, ends_at) VALUES ($1, $2, 'active', $3)")
        .bind(user_id)
        .bind(plan_code)
        .bind(Utc::now() + Duration::days(days))
        .execute(pool)
        .await?;
    Ok(())
}

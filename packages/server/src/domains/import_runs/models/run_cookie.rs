use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::common::ImportRunId;

/// Operator-supplied cookie header reused when a run is resumed.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ImportRunCookie {
    pub run_id: ImportRunId,
    pub cookie_header: String,
    pub updated_at: DateTime<Utc>,
}

impl ImportRunCookie {
    pub async fn find_by_run(run_id: ImportRunId, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM import_run_cookies WHERE run_id = $1")
            .bind(run_id)
            .fetch_optional(pool)
            .await
            .context("Failed to load run cookies")
    }

    pub async fn upsert(run_id: ImportRunId, cookie_header: &str, pool: &PgPool) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO import_run_cookies (run_id, cookie_header)
            VALUES ($1, $2)
            ON CONFLICT (run_id) DO UPDATE SET
                cookie_header = EXCLUDED.cookie_header,
                updated_at = NOW()
            "#,
        )
        .bind(run_id)
        .bind(cookie_header)
        .execute(pool)
        .await
        .context("Failed to save run cookies")?;
        Ok(())
    }

    pub async fn delete(run_id: ImportRunId, pool: &PgPool) -> Result<()> {
        sqlx::query("DELETE FROM import_run_cookies WHERE run_id = $1")
            .bind(run_id)
            .execute(pool)
            .await
            .context("Failed to delete run cookies")?;
        Ok(())
    }
}

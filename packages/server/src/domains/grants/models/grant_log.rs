use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::PgPool;

/// Which grant job a log row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GrantKind {
    DailyVote,
    WeeklyTicket,
}

impl GrantKind {
    fn table(&self) -> &'static str {
        match self {
            GrantKind::DailyVote => "daily_vote_grants",
            GrantKind::WeeklyTicket => "weekly_ticket_grants",
        }
    }
}

/// One row per grant date; re-running a date resets it to `running`.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct GrantLog {
    pub grant_date: NaiveDate,
    pub status: String,
    pub users_processed: i32,
    pub tickets_granted: i32,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl GrantLog {
    pub async fn start(kind: GrantKind, date: NaiveDate, pool: &PgPool) -> Result<()> {
        let sql = format!(
            r#"
            INSERT INTO {table} (grant_date, status, started_at)
            VALUES ($1, 'running', NOW())
            ON CONFLICT (grant_date) DO UPDATE SET
                status = 'running',
                started_at = NOW(),
                completed_at = NULL,
                users_processed = 0,
                tickets_granted = 0,
                error_message = NULL
            "#,
            table = kind.table()
        );
        sqlx::query(&sql)
            .bind(date)
            .execute(pool)
            .await
            .context("Failed to start grant log")?;
        Ok(())
    }

    pub async fn complete(
        kind: GrantKind,
        date: NaiveDate,
        users_processed: i32,
        tickets_granted: i32,
        pool: &PgPool,
    ) -> Result<()> {
        let sql = format!(
            r#"
            UPDATE {table}
            SET status = 'completed', completed_at = NOW(), users_processed = $2, tickets_granted = $3
            WHERE grant_date = $1
            "#,
            table = kind.table()
        );
        sqlx::query(&sql)
            .bind(date)
            .bind(users_processed)
            .bind(tickets_granted)
            .execute(pool)
            .await
            .context("Failed to complete grant log")?;
        Ok(())
    }

    pub async fn fail(kind: GrantKind, date: NaiveDate, error: &str, pool: &PgPool) -> Result<()> {
        let sql = format!(
            r#"
            UPDATE {table}
            SET status = 'failed', completed_at = NOW(), error_message = $2
            WHERE grant_date = $1
            "#,
            table = kind.table()
        );
        sqlx::query(&sql)
            .bind(date)
            .bind(error)
            .execute(pool)
            .await
            .context("Failed to mark grant log failed")?;
        Ok(())
    }

    pub async fn latest(kind: GrantKind, pool: &PgPool) -> Result<Option<Self>> {
        let sql = format!(
            "SELECT * FROM {table} ORDER BY grant_date DESC LIMIT 1",
            table = kind.table()
        );
        sqlx::query_as::<_, Self>(&sql)
            .fetch_optional(pool)
            .await
            .context("Failed to load grant log")
    }

    /// Delete logs older than `keep_days`. Returns rows removed.
    pub async fn prune(kind: GrantKind, keep_days: i32, pool: &PgPool) -> Result<u64> {
        let sql = format!(
            "DELETE FROM {table} WHERE grant_date < CURRENT_DATE - make_interval(days => $1)",
            table = kind.table()
        );
        let result = sqlx::query(&sql)
            .bind(keep_days)
            .execute(pool)
            .await
            .context("Failed to prune grant logs")?;
        Ok(result.rows_affected())
    }
}

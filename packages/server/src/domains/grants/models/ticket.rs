use anyhow::{Context, Result};
use sqlx::PgPool;

use crate::common::UserId;

pub const TICKET_DAILY_VOTE: &str = "daily_vote";
pub const TICKET_NOVEL_REQUEST: &str = "novel_request";
pub const TICKET_TRANSLATION: &str = "translation_ticket";

pub const REASON_DAILY_GRANT: &str = "daily_grant";
pub const REASON_SUBSCRIPTION_GRANT: &str = "subscription_grant";
pub const REASON_LEVEL_REWARD: &str = "level_reward";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantAmount {
    /// Add to the current balance.
    Credit(i32),
    /// Raise or lower the balance to exactly this value.
    SetTo(i32),
}

/// One ledger write, applied at most once per idempotency key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketGrant {
    pub user_id: UserId,
    pub ticket_type: &'static str,
    pub amount: GrantAmount,
    pub reason: &'static str,
    pub idempotency_key: String,
}

/// User row fed to grant jobs.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct GrantUser {
    pub user_id: UserId,
    pub level: i32,
    pub plan_code: Option<String>,
}

impl GrantUser {
    /// Non-banned users ordered by id, with their level and active plan.
    pub async fn batch(limit: i64, offset: i64, pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT
                u.id AS user_id,
                COALESCE(ux.level, 1) AS level,
                s.plan_code
            FROM users u
            LEFT JOIN user_xp ux ON ux.user_id = u.id
            LEFT JOIN LATERAL (
                SELECT plan_code FROM subscriptions
                WHERE user_id = u.id AND status = 'active' AND ends_at > NOW()
                ORDER BY ends_at DESC
                LIMIT 1
            ) s ON true
            WHERE u.is_banned = false
            ORDER BY u.id
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .context("Failed to load grant users")
    }
}

pub struct TicketLedger;

impl TicketLedger {
    /// Write the transaction and move the balance in one database
    /// transaction. Returns false when the idempotency key was already used.
    pub async fn apply(grant: &TicketGrant, pool: &PgPool) -> Result<bool> {
        let mut tx = pool.begin().await.context("Failed to begin ledger transaction")?;

        let current: i32 = sqlx::query_scalar(
            "SELECT balance FROM ticket_balances WHERE user_id = $1 AND ticket_type = $2 FOR UPDATE",
        )
        .bind(grant.user_id)
        .bind(grant.ticket_type)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to read ticket balance")?
        .unwrap_or(0);

        let delta = match grant.amount {
            GrantAmount::Credit(n) => n,
            GrantAmount::SetTo(n) => n - current,
        };

        let inserted = sqlx::query(
            r#"
            INSERT INTO ticket_transactions (user_id, ticket_type, delta, reason, idempotency_key)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (idempotency_key) DO NOTHING
            "#,
        )
        .bind(grant.user_id)
        .bind(grant.ticket_type)
        .bind(delta)
        .bind(grant.reason)
        .bind(&grant.idempotency_key)
        .execute(&mut *tx)
        .await
        .context("Failed to insert ticket transaction")?;

        if inserted.rows_affected() == 0 {
            tx.rollback().await.context("Failed to roll back ledger transaction")?;
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO ticket_balances (user_id, ticket_type, balance)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, ticket_type) DO UPDATE SET
                balance = ticket_balances.balance + EXCLUDED.balance,
                updated_at = NOW()
            "#,
        )
        .bind(grant.user_id)
        .bind(grant.ticket_type)
        .bind(delta)
        .execute(&mut *tx)
        .await
        .context("Failed to update ticket balance")?;

        tx.commit().await.context("Failed to commit ledger transaction")?;
        Ok(true)
    }

    pub async fn balance(user_id: UserId, ticket_type: &str, pool: &PgPool) -> Result<i32> {
        let balance: Option<i32> = sqlx::query_scalar(
            "SELECT balance FROM ticket_balances WHERE user_id = $1 AND ticket_type = $2",
        )
        .bind(user_id)
        .bind(ticket_type)
        .fetch_optional(pool)
        .await
        .context("Failed to read ticket balance")?;
        Ok(balance.unwrap_or(0))
    }
}

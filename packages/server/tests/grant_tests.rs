//! Ticket ledger and grant jobs against Postgres.
//!
//! Tests share one database, so each uses its own grant date and only
//! asserts on users it created.

mod common;

use std::sync::Arc;

use chrono::NaiveDate;
use crate::common::{create_subscription, create_user, TestHarness};
use ingest_core::domains::grants::models::{
    GrantAmount, TicketGrant, TicketLedger, REASON_DAILY_GRANT, TICKET_DAILY_VOTE,
    TICKET_NOVEL_REQUEST, TICKET_TRANSLATION,
};
use ingest_core::domains::grants::{DailyVoteGrantJob, GrantKind, GrantLog, PgGrantStore, WeeklyTicketGrantJob};
use test_context::test_context;

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2030, 1, day).unwrap()
}

#[test_context(TestHarness)]
#[tokio::test]
async fn ledger_write_is_applied_once_per_key(ctx: &TestHarness) {
    let user_id = create_user(&ctx.db_pool, 1, false).await.unwrap();
    let grant = TicketGrant {
        user_id,
        ticket_type: TICKET_NOVEL_REQUEST,
        amount: GrantAmount::Credit(3),
        reason: REASON_DAILY_GRANT,
        idempotency_key: format!("test:{}", user_id),
    };

    assert!(TicketLedger::apply(&grant, &ctx.db_pool).await.unwrap());
    assert!(!TicketLedger::apply(&grant, &ctx.db_pool).await.unwrap());

    let balance = TicketLedger::balance(user_id, TICKET_NOVEL_REQUEST, &ctx.db_pool)
        .await
        .unwrap();
    assert_eq!(balance, 3);
    let entries: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ticket_transactions WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(&ctx.db_pool)
        .await
        .unwrap();
    assert_eq!(entries, 1);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn daily_grant_tops_up_votes_and_skips_banned(ctx: &TestHarness) {
    let active = create_user(&ctx.db_pool, 1, false).await.unwrap();
    let banned = create_user(&ctx.db_pool, 1, true).await.unwrap();
    let job = DailyVoteGrantJob::new(Arc::new(PgGrantStore::new(ctx.db_pool.clone())));

    job.run_for(date(1)).await.unwrap();
    job.run_for(date(1)).await.unwrap();
    job.run_for(date(2)).await.unwrap();

    let votes = TicketLedger::balance(active, TICKET_DAILY_VOTE, &ctx.db_pool).await.unwrap();
    assert_eq!(votes, 1);
    let banned_votes = TicketLedger::balance(banned, TICKET_DAILY_VOTE, &ctx.db_pool).await.unwrap();
    assert_eq!(banned_votes, 0);

    let keys: Vec<String> = sqlx::query_scalar(
        "SELECT idempotency_key FROM ticket_transactions WHERE user_id = $1 ORDER BY idempotency_key",
    )
    .bind(active)
    .fetch_all(&ctx.db_pool)
    .await
    .unwrap();
    assert_eq!(
        keys,
        vec![
            format!("daily_vote:2030-01-01:{}", active),
            format!("daily_vote:2030-01-02:{}", active),
        ]
    );

    let log = GrantLog::latest(GrantKind::DailyVote, &ctx.db_pool).await.unwrap().unwrap();
    assert_eq!(log.status, "completed");
}

#[test_context(TestHarness)]
#[tokio::test]
async fn weekly_grant_pays_plan_and_level_bonus_once(ctx: &TestHarness) {
    let vip = create_user(&ctx.db_pool, 15, false).await.unwrap();
    create_subscription(&ctx.db_pool, vip, "vip", 30).await.unwrap();
    let lapsed = create_user(&ctx.db_pool, 2, false).await.unwrap();
    create_subscription(&ctx.db_pool, lapsed, "premium", -1).await.unwrap();
    let job = WeeklyTicketGrantJob::new(Arc::new(PgGrantStore::new(ctx.db_pool.clone())));

    job.run_for(date(8)).await.unwrap();
    job.run_for(date(8)).await.unwrap();

    let requests = TicketLedger::balance(vip, TICKET_NOVEL_REQUEST, &ctx.db_pool).await.unwrap();
    let translations = TicketLedger::balance(vip, TICKET_TRANSLATION, &ctx.db_pool).await.unwrap();
    assert_eq!((requests, translations), (6, 15));

    let lapsed_requests = TicketLedger::balance(lapsed, TICKET_NOVEL_REQUEST, &ctx.db_pool)
        .await
        .unwrap();
    assert_eq!(lapsed_requests, 0);
}

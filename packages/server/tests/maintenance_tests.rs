mod common;

use chrono::{Duration, Utc};
use crate::common::{create_subscription, create_user, TestHarness};
use ingest_core::common::UserId;
use ingest_core::domains::grants::{GrantKind, GrantLog};
use ingest_core::domains::maintenance::{GrantLogCleanupJob, SubscriptionExpiryJob};
use test_context::test_context;

#[test_context(TestHarness)]
#[tokio::test]
async fn ended_subscriptions_are_expired(ctx: &TestHarness) {
    let ended = create_user(&ctx.db_pool, 1, false).await.unwrap();
    create_subscription(&ctx.db_pool, ended, "premium", -2).await.unwrap();
    let current = create_user(&ctx.db_pool, 1, false).await.unwrap();
    create_subscription(&ctx.db_pool, current, "vip", 5).await.unwrap();

    let expired = SubscriptionExpiryJob::new(ctx.db_pool.clone()).expire().await.unwrap();
    assert!(expired >= 1);

    let status = |user: UserId| {
        let pool = ctx.db_pool.clone();
        async move {
            sqlx::query_scalar::<_, String>("SELECT status FROM subscriptions WHERE user_id = $1")
                .bind(user)
                .fetch_one(&pool)
                .await
                .unwrap()
        }
    };
    assert_eq!(status(ended).await, "expired");
    assert_eq!(status(current).await, "active");
}

#[test_context(TestHarness)]
#[tokio::test]
async fn old_daily_grant_logs_are_pruned(ctx: &TestHarness) {
    let today = Utc::now().date_naive();
    let old = today - Duration::days(45);
    let recent = today - Duration::days(3);
    GrantLog::start(GrantKind::DailyVote, old, &ctx.db_pool).await.unwrap();
    GrantLog::start(GrantKind::DailyVote, recent, &ctx.db_pool).await.unwrap();

    GrantLogCleanupJob::new(ctx.db_pool.clone()).cleanup().await.unwrap();

    let dates: Vec<chrono::NaiveDate> =
        sqlx::query_scalar("SELECT grant_date FROM daily_vote_grants WHERE grant_date IN ($1, $2)")
            .bind(old)
            .bind(recent)
            .fetch_all(&ctx.db_pool)
            .await
            .unwrap();
    assert_eq!(dates, vec![recent]);
}

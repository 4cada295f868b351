//! Daily vote and weekly subscription ticket grants.
//!
//! Both jobs walk eligible users in id order, one batch at a time, and write
//! one ledger entry per grant keyed by date and user. Re-running a date is
//! therefore safe: entries that already exist are skipped.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tracing::{info, warn};

use super::models::{
    GrantAmount, GrantKind, GrantLog, GrantUser, TicketGrant, REASON_DAILY_GRANT,
    REASON_LEVEL_REWARD, REASON_SUBSCRIPTION_GRANT, TICKET_DAILY_VOTE, TICKET_NOVEL_REQUEST,
    TICKET_TRANSLATION,
};
use super::store::GrantStore;
use crate::kernel::ScheduledJob;

pub const GRANT_BATCH_SIZE: i64 = 1000;
pub const DAILY_VOTES: i32 = 1;
/// Users above this level get a weekly novel request on top of their plan.
pub const LEVEL_BONUS_THRESHOLD: i32 = 10;

const BATCH_PAUSE: Duration = Duration::from_millis(100);

/// Weekly (novel_request, translation_ticket) amounts for a plan.
pub fn plan_weekly_amounts(plan_code: Option<&str>) -> (i32, i32) {
    match plan_code {
        Some("premium") => (2, 5),
        Some("vip") => (5, 15),
        _ => (0, 0),
    }
}

pub fn daily_vote_key(date: NaiveDate, user: &GrantUser) -> String {
    format!("daily_vote:{}:{}", date, user.user_id)
}

pub fn weekly_plan_key(date: NaiveDate, user: &GrantUser, ticket_type: &str) -> String {
    format!("weekly_sub:{}:{}:{}", date, user.user_id, ticket_type)
}

pub fn weekly_level_key(date: NaiveDate, user: &GrantUser) -> String {
    format!("weekly_level:{}:{}:{}", date, user.user_id, TICKET_NOVEL_REQUEST)
}

/// Ledger writes a user is owed for the week starting at `date`.
pub fn weekly_grants(date: NaiveDate, user: &GrantUser) -> Vec<TicketGrant> {
    let mut grants = Vec::new();
    let (requests, translations) = plan_weekly_amounts(user.plan_code.as_deref());

    for (ticket_type, amount) in [
        (TICKET_NOVEL_REQUEST, requests),
        (TICKET_TRANSLATION, translations),
    ] {
        if amount > 0 {
            grants.push(TicketGrant {
                user_id: user.user_id,
                ticket_type,
                amount: GrantAmount::Credit(amount),
                reason: REASON_SUBSCRIPTION_GRANT,
                idempotency_key: weekly_plan_key(date, user, ticket_type),
            });
        }
    }

    if user.level > LEVEL_BONUS_THRESHOLD {
        grants.push(TicketGrant {
            user_id: user.user_id,
            ticket_type: TICKET_NOVEL_REQUEST,
            amount: GrantAmount::Credit(1),
            reason: REASON_LEVEL_REWARD,
            idempotency_key: weekly_level_key(date, user),
        });
    }

    grants
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GrantSummary {
    pub users_processed: i32,
    pub tickets_granted: i32,
}

/// Walk every batch and apply the grants `plan` yields per user. Failed
/// writes are logged and skipped.
async fn grant_all(
    store: &dyn GrantStore,
    kind: GrantKind,
    plan: impl Fn(&GrantUser) -> Vec<TicketGrant>,
) -> Result<GrantSummary> {
    let mut summary = GrantSummary::default();
    let mut offset = 0;

    loop {
        let users = store.user_batch(GRANT_BATCH_SIZE, offset).await?;
        if users.is_empty() {
            break;
        }

        for user in &users {
            for grant in plan(user) {
                match store.apply(&grant).await {
                    Ok(true) => summary.tickets_granted += 1,
                    Ok(false) => {}
                    Err(e) => warn!(
                        kind = ?kind,
                        user_id = %user.user_id,
                        key = %grant.idempotency_key,
                        error = %e,
                        "Ticket grant failed"
                    ),
                }
            }
            summary.users_processed += 1;
        }

        if (users.len() as i64) < GRANT_BATCH_SIZE {
            break;
        }
        offset += GRANT_BATCH_SIZE;
        tokio::time::sleep(BATCH_PAUSE).await;
    }

    Ok(summary)
}

/// Run one grant for `date`, recording the outcome in the grant log.
async fn run_logged(
    store: &dyn GrantStore,
    kind: GrantKind,
    date: NaiveDate,
    plan: impl Fn(&GrantUser) -> Vec<TicketGrant>,
) -> Result<GrantSummary> {
    store.start_log(kind, date).await?;

    match grant_all(store, kind, plan).await {
        Ok(summary) => {
            store
                .complete_log(kind, date, summary.users_processed, summary.tickets_granted)
                .await?;
            info!(
                kind = ?kind,
                %date,
                users = summary.users_processed,
                tickets = summary.tickets_granted,
                "Grant completed"
            );
            Ok(summary)
        }
        Err(e) => {
            if let Err(log_err) = store.fail_log(kind, date, &format!("{:#}", e)).await {
                warn!(kind = ?kind, error = %log_err, "Failed to record grant failure");
            }
            Err(e)
        }
    }
}

/// Tops every eligible user's `daily_vote` balance up to one vote.
pub struct DailyVoteGrantJob {
    store: Arc<dyn GrantStore>,
}

impl DailyVoteGrantJob {
    pub fn new(store: Arc<dyn GrantStore>) -> Self {
        Self { store }
    }

    pub async fn run_for(&self, date: NaiveDate) -> Result<GrantSummary> {
        run_logged(self.store.as_ref(), GrantKind::DailyVote, date, |user| {
            vec![TicketGrant {
                user_id: user.user_id,
                ticket_type: TICKET_DAILY_VOTE,
                amount: GrantAmount::SetTo(DAILY_VOTES),
                reason: REASON_DAILY_GRANT,
                idempotency_key: daily_vote_key(date, user),
            }]
        })
        .await
    }

    /// Most recent daily grant log row.
    pub async fn status(&self) -> Result<Option<GrantLog>> {
        self.store.latest_log(GrantKind::DailyVote).await
    }
}

#[async_trait]
impl ScheduledJob for DailyVoteGrantJob {
    fn name(&self) -> &'static str {
        "daily_vote_grant"
    }

    async fn run(&self) -> Result<()> {
        self.run_for(Utc::now().date_naive()).await.map(|_| ())
    }
}

/// Weekly subscription and level rewards.
pub struct WeeklyTicketGrantJob {
    store: Arc<dyn GrantStore>,
}

impl WeeklyTicketGrantJob {
    pub fn new(store: Arc<dyn GrantStore>) -> Self {
        Self { store }
    }

    pub async fn run_for(&self, date: NaiveDate) -> Result<GrantSummary> {
        run_logged(self.store.as_ref(), GrantKind::WeeklyTicket, date, |user| {
            weekly_grants(date, user)
        })
        .await
    }

    pub async fn status(&self) -> Result<Option<GrantLog>> {
        self.store.latest_log(GrantKind::WeeklyTicket).await
    }
}

#[async_trait]
impl ScheduledJob for WeeklyTicketGrantJob {
    fn name(&self) -> &'static str {
        "weekly_ticket_grant"
    }

    async fn run(&self) -> Result<()> {
        self.run_for(Utc::now().date_naive()).await.map(|_| ())
    }
}

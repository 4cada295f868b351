use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use crate::common::ProposalId;
use crate::domains::import_runs::{DailyVoteWinnerSelected, ProposalStore};
use crate::kernel::{EventBus, ScheduledJob};

/// Accepts the highest-voted proposal and announces it so an import starts.
pub struct VotingWinnerJob {
    proposals: Arc<dyn ProposalStore>,
    bus: EventBus,
}

impl VotingWinnerJob {
    pub fn new(proposals: Arc<dyn ProposalStore>, bus: EventBus) -> Self {
        Self { proposals, bus }
    }

    /// Returns the winning proposal, or None when nothing is in voting.
    pub async fn select_winner(&self) -> Result<Option<ProposalId>> {
        let Some(winner) = self.proposals.accept_top_voting().await? else {
            info!("No proposals in voting");
            return Ok(None);
        };

        info!(
            proposal_id = %winner.id,
            vote_score = winner.vote_score,
            "Daily vote winner selected"
        );
        self.bus
            .publish(DailyVoteWinnerSelected {
                proposal_id: winner.id,
            })
            .await?;
        Ok(Some(winner.id))
    }
}

#[async_trait]
impl ScheduledJob for VotingWinnerJob {
    fn name(&self) -> &'static str {
        "voting_winner"
    }

    async fn run(&self) -> Result<()> {
        self.select_winner().await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::import_runs::models::PROPOSAL_ACCEPTED;
    use crate::kernel::test_dependencies::MemoryRunStore;
    use std::sync::Mutex;

    #[tokio::test]
    async fn test_highest_score_wins_and_is_announced() {
        let store = Arc::new(MemoryRunStore::default());
        store.add_proposal_with_score("https://books.test/book/1", 3);
        let top = store.add_proposal_with_score("https://books.test/book/2", 9);
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        bus.on::<DailyVoteWinnerSelected, _, _>(move |event| {
            sink.lock().unwrap().push(event.proposal_id);
            async { Ok(()) }
        });
        let job = VotingWinnerJob::new(store.clone(), bus);

        let winner = job.select_winner().await.unwrap();

        assert_eq!(winner, Some(top));
        assert_eq!(*seen.lock().unwrap(), vec![top]);
        assert_eq!(store.proposal(top).unwrap().status, PROPOSAL_ACCEPTED);
    }

    #[tokio::test]
    async fn test_accepted_proposal_does_not_win_twice() {
        let store = Arc::new(MemoryRunStore::default());
        let only = store.add_proposal_with_score("https://books.test/book/1", 1);
        let job = VotingWinnerJob::new(store.clone(), EventBus::new());

        assert_eq!(job.select_winner().await.unwrap(), Some(only));
        assert_eq!(job.select_winner().await.unwrap(), None);
    }
}

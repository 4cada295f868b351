use crate::common::{NovelId, ProposalId};
use crate::kernel::Event;

/// A proposal won the daily vote and should be imported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyVoteWinnerSelected {
    pub proposal_id: ProposalId,
}

impl Event for DailyVoteWinnerSelected {
    const NAME: &'static str = "daily_vote_winner_selected";
}

/// A proposal's import finished and is linked to its novel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalReleased {
    pub proposal_id: ProposalId,
    pub novel_id: NovelId,
}

impl Event for ProposalReleased {
    const NAME: &'static str = "proposal_released";
}

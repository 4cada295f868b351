//! Daily vote winner selection.

pub mod winner;

pub use winner::VotingWinnerJob;

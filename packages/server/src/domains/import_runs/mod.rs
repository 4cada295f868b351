//! Import runs: persisted run state, live run registry, and the orchestrator
//! that drives site importers.

pub mod cloudflare;
pub mod events;
pub mod models;
pub mod orchestrator;
pub mod registry;
pub mod store;

pub use cloudflare::is_cloudflare_error;
pub use events::{DailyVoteWinnerSelected, ProposalReleased};
pub use models::{ImportRun, ImportRunStatus, Proposal, RunOutcome};
pub use orchestrator::ImportOrchestrator;
pub use registry::{RunHandle, RunRegistry};
pub use store::{ImportRunStore, PgRunStore, ProposalStore, RunCookieStore};

pub mod jobs;
pub mod models;
pub mod store;

pub use jobs::{DailyVoteGrantJob, GrantSummary, WeeklyTicketGrantJob};
pub use models::{GrantAmount, GrantKind, GrantLog, GrantUser, TicketGrant};
pub use store::{GrantStore, PgGrantStore};

pub mod grant_log;
pub mod ticket;

pub use grant_log::*;
pub use ticket::*;

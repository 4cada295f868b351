//! Kernel module - shared infrastructure: cancellation, events, scheduling,
//! and the dependency bundle handed to the orchestrator.

pub mod deps;
pub mod event_bus;
pub mod run_context;
pub mod scheduled_tasks;
pub mod scheduler;
pub mod test_dependencies;
pub mod traits;

pub use deps::IngestDeps;
pub use event_bus::{Event, EventBus, EventEnvelope};
pub use run_context::{RunContext, RunContextError};
pub use scheduled_tasks::{start_scheduler, ScheduledTasks};
pub use scheduler::{Schedule, ScheduledJob, Scheduler};
pub use test_dependencies::TestDependencies;
pub use traits::*;

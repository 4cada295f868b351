//! Resumable novel import: checkpoint, write path, and per-site importers.

pub mod checkpoint;
pub mod cover;
pub mod engine;
pub mod importers;
pub mod models;
pub mod registry;
pub mod slug;
pub mod store;

pub use checkpoint::{Checkpoint, CheckpointError};
pub use cover::CoverDownloader;
pub use engine::{ChapterProgress, ImportError, ImportJob, ImportResult, LogProgress, ResumableImporter};
pub use importers::{ImportRequest, ProposalImporter};
pub use registry::ImporterRegistry;
pub use store::{ChapterRecord, NovelShell, NovelStore, PgNovelStore};

// Novel ingestion core
//
// Imports novels from source sites into the catalog: scrapers per site, a
// resumable chapter-by-chapter importer, persisted import runs with
// pause/resume, and the scheduled jobs (vote grants, winner selection,
// maintenance) that feed it.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;

pub use config::*;

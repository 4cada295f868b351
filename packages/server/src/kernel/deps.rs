//! Ingestion dependencies (using traits for testability)
//!
//! Everything the orchestrator touches goes through this bundle so tests can
//! substitute the memory stores in `test_dependencies`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use sqlx::PgPool;

use crate::config::Config;
use crate::domains::import_runs::{ImportRunStore, PgRunStore, ProposalStore, RunCookieStore};
use crate::domains::importing::{CoverDownloader, ImporterRegistry, NovelStore, PgNovelStore};
use crate::kernel::{BaseAssetDownloader, EventBus};

#[derive(Clone)]
pub struct IngestDeps {
    pub runs: Arc<dyn ImportRunStore>,
    pub run_cookies: Arc<dyn RunCookieStore>,
    pub proposals: Arc<dyn ProposalStore>,
    pub novels: Arc<dyn NovelStore>,
    pub assets: Arc<dyn BaseAssetDownloader>,
    pub importers: ImporterRegistry,
    pub bus: EventBus,
    /// Root for cover assets.
    pub upload_dir: PathBuf,
    /// Absolute deadline of one run task.
    pub run_timeout: Duration,
}

impl IngestDeps {
    /// Postgres-backed stores and the standard importer registry.
    pub fn from_pool(pool: PgPool, config: &Config, bus: EventBus) -> Result<Self> {
        let runs = Arc::new(PgRunStore::new(pool.clone()));
        Ok(Self {
            runs: runs.clone(),
            run_cookies: runs.clone(),
            proposals: runs,
            novels: Arc::new(PgNovelStore::new(pool)),
            assets: Arc::new(CoverDownloader::new()?),
            importers: ImporterRegistry::standard(config),
            bus,
            upload_dir: config.uploads_dir.clone(),
            run_timeout: config.import_run_timeout,
        })
    }
}

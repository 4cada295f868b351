//! Chapter-by-chapter import driven by a resumable checkpoint.
//!
//! The engine is shared by every site importer: it only needs a scraper for
//! the site, a [`NovelStore`] and an asset downloader. Each chapter is
//! committed in its own transaction before the checkpoint advances, so a
//! crash or cancellation loses at most the chapter in flight.

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::checkpoint::{Checkpoint, CheckpointError};
use super::slug::generate_slug;
use super::store::{ChapterRecord, NovelShell, NovelStore};
use crate::common::NovelId;
use crate::domains::scraping::{ChapterRef, ScrapeError};
use crate::kernel::{BaseAssetDownloader, BaseBookScraper, RunContext, RunContextError};

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("invalid import input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Context(#[from] RunContextError),

    #[error(transparent)]
    Scrape(#[from] ScrapeError),

    #[error("store: {0:#}")]
    Store(anyhow::Error),

    #[error("progress callback: {0:#}")]
    Progress(anyhow::Error),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}

/// Receives the checkpoint after the novel shell is created and after every
/// committed chapter. An error aborts the import.
#[async_trait]
pub trait ChapterProgress: Send + Sync {
    async fn record(&self, checkpoint: &Checkpoint) -> anyhow::Result<()>;
}

/// Progress sink for one-off imports that have no run row.
pub struct LogProgress;

#[async_trait]
impl ChapterProgress for LogProgress {
    async fn record(&self, checkpoint: &Checkpoint) -> anyhow::Result<()> {
        info!(
            slug = %checkpoint.slug,
            next_index = checkpoint.next_index,
            total = checkpoint.total_chapters,
            "Import progress"
        );
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ImportJob {
    pub url: String,
    /// 0 imports every listed chapter.
    pub chapters_limit: usize,
    pub upload_dir: PathBuf,
    pub checkpoint: Option<Checkpoint>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportResult {
    pub novel_id: NovelId,
    pub slug: String,
    pub chapters_total: usize,
    pub chapters_saved: usize,
    pub cover_key: Option<String>,
    pub checkpoint: Checkpoint,
}

/// Chapter number: the site's declared number when positive, else position.
pub fn chapter_number(reference: &ChapterRef, index: usize) -> i32 {
    reference
        .number
        .filter(|n| *n > 0)
        .unwrap_or_else(|| i32::try_from(index + 1).unwrap_or(i32::MAX))
}

pub struct ResumableImporter<'a> {
    scraper: &'a dyn BaseBookScraper,
    novels: &'a dyn NovelStore,
    assets: &'a dyn BaseAssetDownloader,
}

impl<'a> ResumableImporter<'a> {
    pub fn new(
        scraper: &'a dyn BaseBookScraper,
        novels: &'a dyn NovelStore,
        assets: &'a dyn BaseAssetDownloader,
    ) -> Self {
        Self {
            scraper,
            novels,
            assets,
        }
    }

    pub async fn run(
        &self,
        ctx: &RunContext,
        job: ImportJob,
        progress: &dyn ChapterProgress,
    ) -> Result<ImportResult, ImportError> {
        let url = job.url.trim();
        if url.is_empty() {
            return Err(ImportError::InvalidInput("url is required".into()));
        }
        ctx.check()?;

        let book = ctx.guard(self.scraper.scrape_book(url)).await??;
        let mut refs = book.chapters.clone();
        if job.chapters_limit > 0 {
            refs.truncate(job.chapters_limit);
        }
        if refs.is_empty() {
            return Err(ScrapeError::Incomplete(format!("no chapters found at {url}")).into());
        }

        let mut checkpoint = job.checkpoint.unwrap_or_default();
        checkpoint.set_total(refs.len());
        let mut cover_key = None;

        let novel_id = match checkpoint.novel_id {
            Some(id) => {
                info!(novel_id = %id, next_index = checkpoint.next_index, total = refs.len(), "Resuming import");
                id
            }
            None => {
                let id = NovelId::new();
                let slug = generate_slug(&book.title, id);

                if let Some(cover_url) = book.cover_url.as_deref().filter(|u| u.starts_with("http")) {
                    match ctx
                        .guard(self.assets.download_cover(cover_url, id, &job.upload_dir))
                        .await?
                    {
                        Ok(key) => cover_key = Some(key),
                        Err(e) => warn!(novel_id = %id, cover_url, error = %e, "Cover download failed"),
                    }
                }

                let shell = NovelShell {
                    id,
                    slug,
                    title: book.title.clone(),
                    description: book.description.clone(),
                    author: book.author.clone(),
                    chapters_count: i32::try_from(refs.len()).unwrap_or(i32::MAX),
                    cover_key: cover_key.clone(),
                };
                let stored_slug = self
                    .novels
                    .create_novel_shell(&shell)
                    .await
                    .map_err(ImportError::Store)?;
                info!(novel_id = %id, slug = %stored_slug, total = refs.len(), "Novel created");

                checkpoint.novel_id = Some(id);
                checkpoint.slug = stored_slug;
                progress
                    .record(&checkpoint)
                    .await
                    .map_err(ImportError::Progress)?;
                id
            }
        };

        let mut chapters_saved = 0;
        for (index, reference) in refs.iter().enumerate().skip(checkpoint.next_index) {
            ctx.check()?;

            let chapter = ctx.guard(self.scraper.scrape_chapter(&reference.url)).await??;
            let title = [chapter.title.trim(), reference.title.trim()]
                .into_iter()
                .find(|t| !t.is_empty())
                .map(str::to_string);
            let record = ChapterRecord {
                novel_id,
                number: chapter_number(reference, index),
                title,
                content: chapter.content,
            };
            self.novels
                .upsert_chapter(&record)
                .await
                .map_err(ImportError::Store)?;

            checkpoint.next_index = index + 1;
            chapters_saved += 1;
            debug!(novel_id = %novel_id, chapter = record.number, next_index = checkpoint.next_index, "Chapter saved");

            progress
                .record(&checkpoint)
                .await
                .map_err(ImportError::Progress)?;
        }

        Ok(ImportResult {
            novel_id,
            slug: checkpoint.slug.clone(),
            chapters_total: refs.len(),
            chapters_saved,
            cover_key,
            checkpoint,
        })
    }
}

// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only. Import and run bookkeeping live in the
// domains and take these as trait objects so tests can swap in memory fakes.
//
// Naming convention: Base* for trait names (e.g., BaseBookScraper)

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;

use crate::common::NovelId;
use crate::domains::scraping::{Book, Chapter, ScrapeResult};

// =============================================================================
// Book Scraper Trait (one implementation per source site)
// =============================================================================

#[async_trait]
pub trait BaseBookScraper: Send + Sync {
    /// Fetch the book page (and catalog, when the site has one) and return
    /// metadata plus the ordered chapter listing.
    async fn scrape_book(&self, url: &str) -> ScrapeResult<Book>;

    /// Fetch a single chapter listed by a prior `scrape_book`.
    async fn scrape_chapter(&self, url: &str) -> ScrapeResult<Chapter>;
}

// =============================================================================
// Asset Downloader Trait
// =============================================================================

#[async_trait]
pub trait BaseAssetDownloader: Send + Sync {
    /// Download a cover image under `upload_dir` and return its storage key
    /// (`covers/<novel_id><ext>`).
    async fn download_cover(&self, url: &str, novel_id: NovelId, upload_dir: &Path)
        -> Result<String>;
}

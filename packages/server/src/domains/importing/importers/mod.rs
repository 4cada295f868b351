//! Proposal importers: one per source site, each pairing a scraper with the
//! shared [`ResumableImporter`] write path.

mod fanqie;
mod remote_site;

use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::checkpoint::Checkpoint;
use super::engine::{ChapterProgress, ImportError, ImportJob, ImportResult, ResumableImporter};
use super::store::NovelStore;
use crate::domains::scraping::storage_state::cookie_header_from_storage_state;
use crate::domains::scraping::ScrapeResult;
use crate::kernel::{BaseAssetDownloader, BaseBookScraper, RunContext};

pub use fanqie::FanqieImporter;
pub use remote_site::RemoteSiteImporter;

/// Host of `url` matches `pattern` exactly or as a subdomain.
pub fn host_matches(url: &str, pattern: &str) -> bool {
    let Some(host) = url::Url::parse(url.trim())
        .ok()
        .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
    else {
        return false;
    };
    host == pattern || host.ends_with(&format!(".{pattern}"))
}

pub struct ImportRequest<'a> {
    pub url: &'a str,
    pub upload_dir: &'a Path,
    pub checkpoint: Option<Checkpoint>,
    pub cookie_header: Option<String>,
    pub chapters_limit: usize,
    pub novels: &'a dyn NovelStore,
    pub assets: &'a dyn BaseAssetDownloader,
}

#[async_trait]
pub trait ProposalImporter: Send + Sync {
    fn name(&self) -> &'static str;

    /// Host patterns this importer owns.
    fn hosts(&self) -> &'static [&'static str];

    fn can_import(&self, url: &str) -> bool {
        self.hosts().iter().any(|pattern| host_matches(url, pattern))
    }

    /// Local Playwright state file for direct fetchers. Remote importers hand
    /// their state file to the parse service instead.
    fn storage_state_path(&self) -> Option<&Path> {
        None
    }

    /// The run's cookie header, else one built from [`Self::storage_state_path`].
    /// An unreadable state file means no cookie, not a failed run.
    async fn session_cookie(&self, explicit: Option<String>, url: &str) -> Option<String> {
        if let Some(cookie) = explicit.filter(|c| !c.trim().is_empty()) {
            return Some(cookie);
        }
        let path = self.storage_state_path()?;
        match cookie_header_from_storage_state(path, url).await {
            Ok(header) if !header.is_empty() => {
                debug!(importer = self.name(), path = %path.display(), "Using storage_state cookies");
                Some(header)
            }
            Ok(_) => None,
            Err(e) => {
                warn!(importer = self.name(), path = %path.display(), error = %e, "Could not read storage_state");
                None
            }
        }
    }

    /// Scraper for one run. Cookie and chapter cap vary per run.
    fn build_scraper(
        &self,
        cookie_header: Option<&str>,
        chapters_limit: usize,
    ) -> ScrapeResult<Box<dyn BaseBookScraper>>;

    async fn import(
        &self,
        ctx: &RunContext,
        request: ImportRequest<'_>,
        progress: &dyn ChapterProgress,
    ) -> Result<ImportResult, ImportError> {
        let cookie_header = self.session_cookie(request.cookie_header, request.url).await;
        let scraper = self.build_scraper(cookie_header.as_deref(), request.chapters_limit)?;
        let job = ImportJob {
            url: request.url.to_string(),
            chapters_limit: request.chapters_limit,
            upload_dir: request.upload_dir.to_path_buf(),
            checkpoint: request.checkpoint,
        };
        ResumableImporter::new(scraper.as_ref(), request.novels, request.assets)
            .run(ctx, job, progress)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteSession;

    #[test]
    fn test_host_matches_exact_and_subdomain() {
        assert!(host_matches("https://fanqienovel.com/page/1", "fanqienovel.com"));
        assert!(host_matches("https://www.69shuba.com/book/1.htm", "69shuba.com"));
        assert!(host_matches("HTTPS://M.TADU.COM/book/1", "tadu.com"));
        assert!(!host_matches("https://notfanqienovel.com/page/1", "fanqienovel.com"));
        assert!(!host_matches("https://fanqienovel.com.evil.test/", "fanqienovel.com"));
        assert!(!host_matches("not a url", "tadu.com"));
    }

    fn fanqie_with_state(json: &str) -> (tempfile::TempDir, FanqieImporter) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fanqie_storage.json");
        std::fs::write(&path, json).unwrap();
        let importer = FanqieImporter::new(SiteSession {
            storage_state_path: Some(path.to_string_lossy().into_owned()),
            referer: None,
        });
        (dir, importer)
    }

    const FANQIE_STATE: &str = r#"{
        "cookies": [
            {"name": "sessionid", "value": "s1", "domain": ".fanqienovel.com", "path": "/"},
            {"name": "other", "value": "x", "domain": "example.com", "path": "/"}
        ]
    }"#;

    #[tokio::test]
    async fn test_storage_state_fills_missing_cookie() {
        let (_dir, importer) = fanqie_with_state(FANQIE_STATE);
        let cookie = importer
            .session_cookie(None, "https://fanqienovel.com/page/7")
            .await;
        assert_eq!(cookie.as_deref(), Some("sessionid=s1"));

        let blank = importer
            .session_cookie(Some("  ".into()), "https://fanqienovel.com/page/7")
            .await;
        assert_eq!(blank.as_deref(), Some("sessionid=s1"));
    }

    #[tokio::test]
    async fn test_explicit_cookie_beats_storage_state() {
        let (_dir, importer) = fanqie_with_state(FANQIE_STATE);
        let cookie = importer
            .session_cookie(Some("sid=explicit".into()), "https://fanqienovel.com/page/7")
            .await;
        assert_eq!(cookie.as_deref(), Some("sid=explicit"));
    }

    #[tokio::test]
    async fn test_unusable_storage_state_means_no_cookie() {
        let (_dir, importer) = fanqie_with_state("not json");
        assert_eq!(importer.session_cookie(None, "https://fanqienovel.com/").await, None);

        let missing = FanqieImporter::new(SiteSession {
            storage_state_path: Some("/nonexistent/fanqie_storage.json".into()),
            referer: None,
        });
        assert_eq!(missing.session_cookie(None, "https://fanqienovel.com/").await, None);
        assert_eq!(
            FanqieImporter::default()
                .session_cookie(None, "https://fanqienovel.com/")
                .await,
            None
        );
    }
}

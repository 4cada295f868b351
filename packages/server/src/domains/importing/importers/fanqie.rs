use std::path::Path;

use super::ProposalImporter;
use crate::config::SiteSession;
use crate::domains::scraping::{FanqieScraper, ScrapeResult};
use crate::kernel::BaseBookScraper;

/// Fanqie serves plain HTML, so it is fetched directly.
#[derive(Debug, Clone, Default)]
pub struct FanqieImporter {
    pub user_agent: Option<String>,
    session: SiteSession,
}

impl FanqieImporter {
    pub fn new(session: SiteSession) -> Self {
        Self {
            user_agent: None,
            session,
        }
    }
}

impl ProposalImporter for FanqieImporter {
    fn name(&self) -> &'static str {
        "fanqie"
    }

    fn hosts(&self) -> &'static [&'static str] {
        &["fanqienovel.com"]
    }

    fn storage_state_path(&self) -> Option<&Path> {
        self.session.storage_state_path.as_deref().map(Path::new)
    }

    fn build_scraper(
        &self,
        cookie_header: Option<&str>,
        _chapters_limit: usize,
    ) -> ScrapeResult<Box<dyn BaseBookScraper>> {
        let scraper = FanqieScraper::new(cookie_header.map(str::to_string), self.user_agent.clone())?;
        Ok(Box::new(scraper))
    }
}

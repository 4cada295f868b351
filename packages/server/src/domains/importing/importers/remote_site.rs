use parser_client::ParserClient;

use super::ProposalImporter;
use crate::config::SiteSession;
use crate::domains::scraping::{RemoteBrowserScraper, RemoteOptions, ScrapeResult};
use crate::kernel::BaseBookScraper;

/// Importer for sites behind Cloudflare, rendered by the parse service.
#[derive(Debug, Clone)]
pub struct RemoteSiteImporter {
    name: &'static str,
    hosts: &'static [&'static str],
    client: ParserClient,
    session: SiteSession,
}

impl RemoteSiteImporter {
    pub fn kks101(client: ParserClient, session: SiteSession) -> Self {
        Self {
            name: "101kks",
            hosts: &["101kks.com"],
            client,
            session,
        }
    }

    pub fn shuba69(client: ParserClient, session: SiteSession) -> Self {
        Self {
            name: "69shuba",
            hosts: &["69shuba.com"],
            client,
            session,
        }
    }

    pub fn tadu(client: ParserClient, session: SiteSession) -> Self {
        Self {
            name: "tadu",
            hosts: &["tadu.com"],
            client,
            session,
        }
    }

    pub fn options(&self, cookie_header: Option<&str>, chapters_limit: usize) -> RemoteOptions {
        let mut options = RemoteOptions::for_site(self.name).with_session(&self.session);
        options.cookie_header = cookie_header.map(str::to_string);
        options.chapters_limit = u32::try_from(chapters_limit).unwrap_or(u32::MAX);
        options
    }
}

impl ProposalImporter for RemoteSiteImporter {
    fn name(&self) -> &'static str {
        self.name
    }

    fn hosts(&self) -> &'static [&'static str] {
        self.hosts
    }

    fn build_scraper(
        &self,
        cookie_header: Option<&str>,
        chapters_limit: usize,
    ) -> ScrapeResult<Box<dyn BaseBookScraper>> {
        Ok(Box::new(RemoteBrowserScraper::new(
            self.client.clone(),
            self.options(cookie_header, chapters_limit),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_carry_session_and_cookie() {
        let importer = RemoteSiteImporter::shuba69(
            ParserClient::new("http://parser.test"),
            SiteSession {
                storage_state_path: Some("/app/cookies/69shuba_storage.json".into()),
                referer: Some("https://www.69shuba.com/".into()),
            },
        );

        let opts = importer.options(Some("cf_clearance=abc"), 10);
        assert_eq!(opts.site, "69shuba");
        assert_eq!(opts.storage_state_path.as_deref(), Some("/data/69shuba_storage.json"));
        assert_eq!(opts.referer.as_deref(), Some("https://www.69shuba.com/"));
        assert_eq!(opts.cookie_header.as_deref(), Some("cf_clearance=abc"));
        assert_eq!(opts.chapters_limit, 10);
    }
}

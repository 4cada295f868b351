//! Remote-browser adapter backed by the headless parse service.
//!
//! One `scrape_book` call renders the book *and* every chapter. The chapter
//! bodies are cached by the catalog reference at the same position and served
//! from memory by `scrape_chapter`.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use parser_client::{ParseRequest, ParseResponse, ParserClient};
use tracing::info;

use super::error::{ScrapeError, ScrapeResult};
use super::text::{clean_chapter_text, non_empty};
use super::types::{Book, Chapter, ChapterRef};
use crate::config::SiteSession;
use crate::kernel::BaseBookScraper;

/// Browser humanization and session parameters for one site.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteOptions {
    pub site: String,
    pub chapters_limit: u32,
    pub user_agent: Option<String>,
    pub referer: Option<String>,
    pub cookie_header: Option<String>,
    /// Path as seen by the parse service.
    pub storage_state_path: Option<String>,
    pub navigation_timeout_ms: u32,
    pub humanize: bool,
    pub locale: String,
    pub timezone_id: String,
    pub viewport: (u32, u32),
    pub human_delay_ms: (u32, u32),
    pub cloudflare_wait_ms: u32,
}

impl RemoteOptions {
    pub fn for_site(site: &str) -> Self {
        Self {
            site: site.to_string(),
            chapters_limit: 0,
            user_agent: None,
            referer: None,
            cookie_header: None,
            storage_state_path: None,
            navigation_timeout_ms: 300_000,
            humanize: true,
            locale: "ru-RU".to_string(),
            timezone_id: "Europe/Moscow".to_string(),
            viewport: (1365, 768),
            human_delay_ms: (220, 950),
            cloudflare_wait_ms: 12_000,
        }
    }

    /// Seed session fields from per-site configuration.
    pub fn with_session(mut self, session: &SiteSession) -> Self {
        self.storage_state_path = session.service_storage_state_path();
        self.referer = session.referer.clone();
        self
    }

    pub fn to_request(&self, url: &str) -> ParseRequest {
        ParseRequest {
            url: url.to_string(),
            site: Some(self.site.clone()),
            chapters_limit: self.chapters_limit,
            user_agent: self.user_agent.clone(),
            referer: self.referer.clone(),
            cookie_header: self.cookie_header.clone().filter(|c| !c.trim().is_empty()),
            storage_state_path: self.storage_state_path.clone(),
            navigation_timeout_ms: Some(self.navigation_timeout_ms),
            humanize: self.humanize,
            locale: Some(self.locale.clone()),
            timezone_id: Some(self.timezone_id.clone()),
            viewport_width: Some(self.viewport.0),
            viewport_height: Some(self.viewport.1),
            human_delay_ms_min: Some(self.human_delay_ms.0),
            human_delay_ms_max: Some(self.human_delay_ms.1),
            cloudflare_wait_ms: Some(self.cloudflare_wait_ms),
        }
    }
}

#[derive(Debug, Default)]
struct RenderedChapters {
    /// Catalog URL -> position in the catalog.
    positions: HashMap<String, usize>,
    bodies: Vec<Chapter>,
}

pub struct RemoteBrowserScraper {
    client: ParserClient,
    options: RemoteOptions,
    rendered: Mutex<RenderedChapters>,
}

impl RemoteBrowserScraper {
    pub fn new(client: ParserClient, options: RemoteOptions) -> Self {
        Self {
            client,
            options,
            rendered: Mutex::new(RenderedChapters::default()),
        }
    }

    pub fn options(&self) -> &RemoteOptions {
        &self.options
    }

    /// Convert a service response and remember its chapter bodies.
    fn absorb(&self, resp: ParseResponse) -> Book {
        let info = resp.book;
        let chapters: Vec<ChapterRef> = info
            .chapters
            .into_iter()
            .map(|r| ChapterRef {
                url: r.url,
                title: r.title.trim().to_string(),
                number: r.number,
            })
            .collect();

        let bodies: Vec<Chapter> = resp
            .chapters
            .into_iter()
            .map(|c| {
                let title = c.title.trim().to_string();
                Chapter {
                    content: clean_chapter_text(&c.content, &title),
                    url: c.url,
                    title,
                }
            })
            .collect();

        let mut rendered = self.rendered.lock().unwrap_or_else(PoisonError::into_inner);
        rendered.positions = chapters
            .iter()
            .enumerate()
            .map(|(i, r)| (r.url.clone(), i))
            .collect();
        rendered.bodies = bodies;

        Book {
            title: info.title.trim().to_string(),
            cover_url: info.cover_url.as_deref().and_then(non_empty),
            description: info.description.as_deref().and_then(non_empty),
            author: info.author.as_deref().and_then(non_empty),
            category: info.category.as_deref().and_then(non_empty),
            tags: info.tags,
            catalog_url: info.catalog_url.as_deref().and_then(non_empty),
            chapters,
        }
    }
}

#[async_trait]
impl BaseBookScraper for RemoteBrowserScraper {
    async fn scrape_book(&self, url: &str) -> ScrapeResult<Book> {
        let resp = self.client.parse(&self.options.to_request(url)).await?;
        info!(
            site = %resp.site,
            url,
            listed = resp.book.chapters.len(),
            rendered = resp.chapters.len(),
            "Parse service returned book"
        );
        Ok(self.absorb(resp))
    }

    async fn scrape_chapter(&self, url: &str) -> ScrapeResult<Chapter> {
        let rendered = self.rendered.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(&position) = rendered.positions.get(url) else {
            return Err(ScrapeError::Incomplete(format!(
                "chapter {url} was not listed by the parse service"
            )));
        };
        rendered.bodies.get(position).cloned().ok_or_else(|| {
            ScrapeError::Incomplete(format!(
                "parser service returned {} chapters, expected at least {}",
                rendered.bodies.len(),
                position + 1
            ))
        })
    }
}

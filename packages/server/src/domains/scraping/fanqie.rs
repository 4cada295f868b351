//! fanqienovel.com adapter (direct fetch).
//!
//! Book pages list every chapter inline, so no catalog pass is needed.

use async_trait::async_trait;
use scraper::Html;

use super::error::{ScrapeError, ScrapeResult};
use super::fetcher::{random_hex, FetcherOptions, HttpFetcher};
use super::html::{element_text, meta_property, resolve_url, select_all, select_all_in, select_first};
use super::text::{non_empty, normalize_text};
use super::types::{Book, Chapter, ChapterRef};
use crate::kernel::BaseBookScraper;

const FALLBACK_TITLE: &str = "Fanqie Novel";

pub fn parse_book_page(page_url: &str, html: &str) -> ScrapeResult<Book> {
    let doc = Html::parse_document(html);

    let title = meta_property(&doc, "og:title")
        .or_else(|| select_first(&doc, "h1").map(element_text).and_then(|t| non_empty(&t)))
        .unwrap_or_else(|| FALLBACK_TITLE.to_string());

    let description = select_first(&doc, "div.page-abstract-content").and_then(|desc| {
        let parts: Vec<String> = select_all_in(desc, "p")
            .into_iter()
            .map(element_text)
            .filter(|t| !t.is_empty())
            .collect();
        non_empty(&parts.join("\n\n"))
    });

    let chapters: Vec<ChapterRef> = select_all(&doc, "a.chapter-item-title[href]")
        .into_iter()
        .filter_map(|a| {
            let href = a.value().attr("href")?;
            Some(ChapterRef {
                url: resolve_url(page_url, href)?,
                title: element_text(a),
                number: None,
            })
        })
        .collect();

    if chapters.is_empty() {
        return Err(ScrapeError::parse(page_url, "no chapters found on page"));
    }

    Ok(Book {
        title,
        cover_url: meta_property(&doc, "og:image"),
        description,
        chapters,
        ..Default::default()
    })
}

pub fn parse_chapter_page(chapter_url: &str, html: &str) -> ScrapeResult<Chapter> {
    let doc = Html::parse_document(html);

    let title = select_first(&doc, "h1.muye-reader-title")
        .map(element_text)
        .unwrap_or_default();

    let container = select_first(&doc, "div.muye-reader-content")
        .ok_or_else(|| ScrapeError::parse(chapter_url, "muye-reader-content not found"))?;

    let paragraphs: Vec<String> = select_all_in(container, "p")
        .into_iter()
        .map(element_text)
        .filter(|t| !t.is_empty())
        .collect();
    let content = normalize_text(&paragraphs.join("\n\n"));
    if content.is_empty() {
        return Err(ScrapeError::parse(chapter_url, "empty chapter content"));
    }

    Ok(Chapter {
        url: chapter_url.to_string(),
        title,
        content,
    })
}

pub struct FanqieScraper {
    fetcher: HttpFetcher,
}

impl FanqieScraper {
    /// Public pages need no login; without a cookie a random session pair is
    /// sent so requests look like an ordinary browser session.
    pub fn new(cookie: Option<String>, user_agent: Option<String>) -> ScrapeResult<Self> {
        let cookie = cookie
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| format!("sessionid={}; csrftoken={}", random_hex(16), random_hex(16)));
        let fetcher = HttpFetcher::new(FetcherOptions {
            user_agent,
            cookie: Some(cookie),
            timeout: std::time::Duration::from_secs(25),
            ..Default::default()
        })?;
        Ok(Self { fetcher })
    }
}

#[async_trait]
impl BaseBookScraper for FanqieScraper {
    async fn scrape_book(&self, url: &str) -> ScrapeResult<Book> {
        let html = self.fetcher.get(url).await?;
        parse_book_page(url, &html)
    }

    async fn scrape_chapter(&self, url: &str) -> ScrapeResult<Chapter> {
        let html = self.fetcher.get(url).await?;
        parse_chapter_page(url, &html)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOOK_HTML: &str = r#"<html><head>
        <meta property="og:title" content="我的师父是剑仙">
        <meta property="og:image" content="https://p3.fqnovelpic.com/cover.jpg">
        </head><body>
        <h1>ignored</h1>
        <div class="page-abstract-content"><p>第一段简介</p><p></p><p>第二段简介</p></div>
        <div class="chapter-item"><a href="/reader/7001" class="chapter-item-title">第1章 下山</a></div>
        <div class="chapter-item"><a href="/reader/7002" class="chapter-item-title">第2章 入城</a></div>
        </body></html>"#;

    #[test]
    fn test_parse_book_page() {
        let book = parse_book_page("https://fanqienovel.com/page/42", BOOK_HTML).unwrap();
        assert_eq!(book.title, "我的师父是剑仙");
        assert_eq!(book.cover_url.as_deref(), Some("https://p3.fqnovelpic.com/cover.jpg"));
        assert_eq!(book.description.as_deref(), Some("第一段简介\n\n第二段简介"));
        assert_eq!(book.chapters.len(), 2);
        assert_eq!(book.chapters[0].url, "https://fanqienovel.com/reader/7001");
        assert_eq!(book.chapters[1].title, "第2章 入城");
        assert_eq!(book.chapters[0].number, None);
    }

    #[test]
    fn test_parse_book_page_title_falls_back_to_h1() {
        let html = r#"<h1> 标题 </h1><a class="chapter-item-title" href="/reader/1">一</a>"#;
        let book = parse_book_page("https://fanqienovel.com/page/1", html).unwrap();
        assert_eq!(book.title, "标题");
    }

    #[test]
    fn test_parse_book_page_without_chapters_fails() {
        let err = parse_book_page("https://fanqienovel.com/page/1", "<h1>x</h1>").unwrap_err();
        assert!(err.to_string().contains("no chapters found"));
    }

    #[test]
    fn test_parse_chapter_page() {
        let html = r#"<h1 class="muye-reader-title">第1章 下山</h1>
            <div class="muye-reader-content noselect"><p>　　山风很大。</p><p></p><p>他走了。</p></div>"#;
        let chapter = parse_chapter_page("https://fanqienovel.com/reader/7001", html).unwrap();
        assert_eq!(chapter.title, "第1章 下山");
        assert_eq!(chapter.content, "山风很大。\n\n他走了。");
    }

    #[test]
    fn test_parse_chapter_page_missing_container() {
        let err = parse_chapter_page("https://fanqienovel.com/reader/1", "<p>x</p>").unwrap_err();
        assert!(err.to_string().contains("muye-reader-content not found"));
    }

    #[test]
    fn test_new_generates_session_cookie() {
        let scraper = FanqieScraper::new(None, None).unwrap();
        let cookie = scraper.fetcher.headers()[reqwest::header::COOKIE].to_str().unwrap();
        assert!(cookie.starts_with("sessionid="));
        assert!(cookie.contains("; csrftoken="));
    }
}

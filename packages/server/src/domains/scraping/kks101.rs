//! 101kks.com adapter (direct fetch).
//!
//! The book page carries OpenGraph metadata and a link to the full catalog;
//! the catalog page carries the chapter list. Both are fetched and merged.

use std::collections::HashSet;

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use scraper::{ElementRef, Html};
use tracing::warn;
use url::Url;

use super::error::{ScrapeError, ScrapeResult};
use super::fetcher::{FetcherOptions, HttpFetcher};
use super::html::{element_text, meta_property, resolve_url, select_all, select_first, select_first_in};
use super::text::{clean_chapter_text, non_empty, normalize_text};
use super::types::{Book, Chapter, ChapterRef};
use crate::kernel::BaseBookScraper;

lazy_static! {
    static ref CHAPTER_PATH: Regex = Regex::new(r"(?i)^/txt/\d+/\d+\.html$").unwrap();
    static ref BOOKINFO_TAGS: Regex = Regex::new(r"tags\s*:\s*'([^']*)'").unwrap();
}

/// Elements inside the chapter body that hold ads or navigation.
const SKIPPED_CLASSES: &[&str] = &["txtad", "txtcenter", "bottom-ad", "page1"];

pub fn parse_book_page(page_url: &str, html: &str) -> ScrapeResult<Book> {
    let doc = Html::parse_document(html);

    let title = meta_property(&doc, "og:title")
        .ok_or_else(|| ScrapeError::parse(page_url, "book title not found"))?;

    let tags = select_all(&doc, "script")
        .into_iter()
        .find_map(|script| {
            let text = script.text().collect::<String>();
            let raw = BOOKINFO_TAGS.captures(&text)?.get(1)?.as_str().trim().to_string();
            (!raw.is_empty()).then_some(raw)
        })
        .map(|raw| dedup_keep_order(raw.split(',')))
        .unwrap_or_default();

    let catalog_url = meta_property(&doc, "og:novel:read_url").or_else(|| {
        select_all(&doc, "a.more-btn[href]")
            .into_iter()
            .filter_map(|a| a.value().attr("href"))
            .find(|href| !href.trim().is_empty())
            .and_then(|href| resolve_url(page_url, href))
    });

    Ok(Book {
        title,
        cover_url: meta_property(&doc, "og:image"),
        description: meta_property(&doc, "og:description")
            .map(|d| normalize_text(&d))
            .filter(|d| !d.is_empty()),
        author: meta_property(&doc, "og:novel:author"),
        category: meta_property(&doc, "og:novel:category"),
        tags,
        catalog_url,
        chapters: vec![],
    })
}

pub fn parse_catalog_page(page_url: &str, html: &str) -> ScrapeResult<Book> {
    let doc = Html::parse_document(html);

    let title = meta_property(&doc, "og:title")
        .or_else(|| select_first(&doc, "h1").map(element_text).and_then(|t| non_empty(&t)))
        .unwrap_or_default();

    let mut seen = HashSet::new();
    let chapters: Vec<ChapterRef> = select_all(&doc, "a[href]")
        .into_iter()
        .filter_map(|a| {
            let abs = resolve_url(page_url, a.value().attr("href")?)?;
            let path_ok = Url::parse(&abs)
                .map(|u| CHAPTER_PATH.is_match(u.path()))
                .unwrap_or(false);
            if !path_ok || !seen.insert(abs.clone()) {
                return None;
            }
            let title = element_text(a);
            Some(ChapterRef {
                number: parse_chapter_number(&title),
                url: abs,
                title,
            })
        })
        .collect();

    if chapters.is_empty() {
        return Err(ScrapeError::parse(page_url, "no chapters found on catalog page"));
    }

    Ok(Book {
        title,
        catalog_url: Some(page_url.to_string()),
        chapters,
        ..Default::default()
    })
}

pub fn parse_chapter_page(chapter_url: &str, html: &str) -> ScrapeResult<Chapter> {
    let doc = Html::parse_document(html);

    let nav = select_first(&doc, "div.txtnav")
        .ok_or_else(|| ScrapeError::parse(chapter_url, "txtnav not found"))?;
    let title = select_first_in(nav, "h1").map(element_text).unwrap_or_default();
    let body = select_first_in(nav, "div#txtcontent").unwrap_or(nav);

    let mut raw = String::new();
    collect_text(body, &mut raw);
    let content = clean_chapter_text(&raw, &title);
    if content.is_empty() {
        return Err(ScrapeError::parse(chapter_url, "empty chapter content"));
    }

    Ok(Chapter {
        url: chapter_url.to_string(),
        title,
        content,
    })
}

/// Text of `el`, skipping scripts and ad blocks, with `<br>` as a newline.
fn collect_text(el: ElementRef<'_>, out: &mut String) {
    for child in el.children() {
        if let Some(child_el) = ElementRef::wrap(child) {
            let value = child_el.value();
            if value.name() == "br" {
                out.push('\n');
                continue;
            }
            if value.name() == "script" || value.classes().any(|c| SKIPPED_CLASSES.contains(&c)) {
                continue;
            }
            collect_text(child_el, out);
        } else if let Some(text) = child.value().as_text() {
            out.push_str(text);
        }
    }
}

/// Number from a `第N章` title prefix, when N is plain digits.
pub fn parse_chapter_number(title: &str) -> Option<i32> {
    let start = title.find('第')? + '第'.len_utf8();
    let end = title.find('章')?;
    if end <= start {
        return None;
    }
    title[start..end].trim().parse().ok().filter(|n| *n > 0)
}

fn dedup_keep_order<'a>(items: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .map(str::trim)
        .filter(|s| !s.is_empty() && seen.insert(s.to_string()))
        .map(str::to_string)
        .collect()
}

fn first_non_empty(preferred: Option<String>, fallback: Option<String>) -> Option<String> {
    preferred.filter(|s| !s.trim().is_empty()).or(fallback)
}

/// Prefer the catalog's chapter list, filling metadata it lacks from the book page.
pub fn merge_catalog(book: Book, catalog: Book) -> Book {
    Book {
        title: first_non_empty(Some(catalog.title), Some(book.title)).unwrap_or_default(),
        cover_url: first_non_empty(catalog.cover_url, book.cover_url),
        description: first_non_empty(catalog.description, book.description),
        author: first_non_empty(catalog.author, book.author),
        category: first_non_empty(catalog.category, book.category),
        tags: if catalog.tags.is_empty() { book.tags } else { catalog.tags },
        catalog_url: first_non_empty(catalog.catalog_url, book.catalog_url),
        chapters: catalog.chapters,
    }
}

pub struct Kks101Scraper {
    fetcher: HttpFetcher,
}

impl Kks101Scraper {
    pub fn new(
        cookie: Option<String>,
        user_agent: Option<String>,
        referer: Option<String>,
    ) -> ScrapeResult<Self> {
        let fetcher = HttpFetcher::new(FetcherOptions {
            user_agent,
            referer,
            cookie,
            accept_language: "ru,en;q=0.9".to_string(),
            client_hints: true,
            ..Default::default()
        })?;
        Ok(Self { fetcher })
    }
}

#[async_trait]
impl BaseBookScraper for Kks101Scraper {
    async fn scrape_book(&self, url: &str) -> ScrapeResult<Book> {
        let html = self.fetcher.get(url).await?;
        let book = parse_book_page(url, &html)?;

        let Some(catalog_url) = book.catalog_url.clone() else {
            return Ok(book);
        };
        let catalog = match self.fetcher.get(&catalog_url).await {
            Ok(html) => parse_catalog_page(&catalog_url, &html),
            Err(e) => Err(e),
        };
        match catalog {
            Ok(catalog) => Ok(merge_catalog(book, catalog)),
            Err(e) => {
                warn!(url, catalog_url = %catalog_url, error = %e, "Catalog page unusable, keeping book page listing");
                Ok(book)
            }
        }
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
        <meta property="og:title" content="斗破苍穹">
        <meta property="og:image" content="https://101kks.com/cover/12544.jpg">
        <meta property="og:description" content="  三十年河东，\r\n三十年河西。 ">
        <meta property="og:novel:author" content="天蚕土豆">
        <meta property="og:novel:category" content="玄幻">
        <meta property="og:novel:read_url" content="https://101kks.com/book/12544/index.html">
        </head><body>
        <script>var bookinfo = { id: 12544, tags: '玄幻,热血, 玄幻,,' };</script>
        </body></html>"#;

    const CATALOG_HTML: &str = r#"<html><body><h1>斗破苍穹 目录</h1>
        <a href="/txt/12544/1.html">第1章 陨落的天才</a>
        <a href="/txt/12544/2.html">第2章 斗气大陆</a>
        <a href="/txt/12544/2.html">第2章 斗气大陆</a>
        <a href="/book/12544.html">返回书页</a>
        <a href="/txt/12544/3.html">番外 云岚宗</a>
        </body></html>"#;

    #[test]
    fn test_parse_book_page() {
        let book = parse_book_page("https://101kks.com/book/12544.html", BOOK_HTML).unwrap();
        assert_eq!(book.title, "斗破苍穹");
        assert_eq!(book.author.as_deref(), Some("天蚕土豆"));
        assert_eq!(book.category.as_deref(), Some("玄幻"));
        assert_eq!(book.description.as_deref(), Some("三十年河东，\n三十年河西。"));
        assert_eq!(book.tags, vec!["玄幻", "热血"]);
        assert_eq!(
            book.catalog_url.as_deref(),
            Some("https://101kks.com/book/12544/index.html")
        );
    }

    #[test]
    fn test_parse_book_page_catalog_from_more_button() {
        let html = r#"<meta property="og:title" content="书"><a class="more-btn" href="/book/9/index.html">完整目錄</a>"#;
        let book = parse_book_page("https://101kks.com/book/9.html", html).unwrap();
        assert_eq!(
            book.catalog_url.as_deref(),
            Some("https://101kks.com/book/9/index.html")
        );
    }

    #[test]
    fn test_parse_book_page_requires_title() {
        assert!(parse_book_page("https://101kks.com/book/1.html", "<html></html>").is_err());
    }

    #[test]
    fn test_parse_catalog_page() {
        let catalog =
            parse_catalog_page("https://101kks.com/book/12544/index.html", CATALOG_HTML).unwrap();
        assert_eq!(catalog.title, "斗破苍穹 目录");
        assert_eq!(catalog.chapters.len(), 3);
        assert_eq!(catalog.chapters[0].number, Some(1));
        assert_eq!(catalog.chapters[1].url, "https://101kks.com/txt/12544/2.html");
        assert_eq!(catalog.chapters[2].number, None);
    }

    #[test]
    fn test_merge_prefers_catalog_chapters_and_fills_metadata() {
        let book = parse_book_page("https://101kks.com/book/12544.html", BOOK_HTML).unwrap();
        let catalog =
            parse_catalog_page("https://101kks.com/book/12544/index.html", CATALOG_HTML).unwrap();

        let merged = merge_catalog(book, catalog);

        assert_eq!(merged.title, "斗破苍穹 目录");
        assert_eq!(merged.author.as_deref(), Some("天蚕土豆"));
        assert_eq!(merged.tags, vec!["玄幻", "热血"]);
        assert_eq!(merged.chapters.len(), 3);
    }

    #[test]
    fn test_parse_chapter_page_skips_ads_and_title_line() {
        let html = r#"<div class="txtnav"><h1>第1章 陨落的天才</h1>
            <div id="txtcontent">第1章 陨落的天才<br>&emsp;&emsp;“斗之力，三段！”<br><br><br><br>
            <div class="txtad">广告</div><script>ads()</script>望着测验魔石碑。<br>
            <div class="page1">下一页</div></div></div>"#;
        let chapter = parse_chapter_page("https://101kks.com/txt/12544/1.html", html).unwrap();
        assert_eq!(chapter.title, "第1章 陨落的天才");
        assert_eq!(chapter.content, "“斗之力，三段！”\n\n望着测验魔石碑。");
    }

    #[test]
    fn test_parse_chapter_page_without_txtnav() {
        let err = parse_chapter_page("https://101kks.com/txt/1/1.html", "<p>x</p>").unwrap_err();
        assert!(err.to_string().contains("txtnav not found"));
    }

    #[test]
    fn test_parse_chapter_number() {
        assert_eq!(parse_chapter_number("第12章 标题"), Some(12));
        assert_eq!(parse_chapter_number("第 7 章"), Some(7));
        assert_eq!(parse_chapter_number("第十二章"), None);
        assert_eq!(parse_chapter_number("章第"), None);
        assert_eq!(parse_chapter_number("序章"), None);
    }
}

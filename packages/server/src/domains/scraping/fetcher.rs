//! Direct HTTP fetcher with browser-like request headers.
//!
//! Bodies are decoded using the response's declared charset. Pages that turn
//! out to be a Cloudflare interstitial are reported as
//! [`ScrapeError::Challenge`] instead of being handed to a parser.

use std::time::Duration;

use lazy_static::lazy_static;
use regex::Regex;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use tracing::debug;

use super::challenge::looks_like_cloudflare_challenge;
use super::error::{ScrapeError, ScrapeResult, MAX_STATUS_BODY};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// How much of a page head is inspected for challenge markers.
const CHALLENGE_SNIPPET_BYTES: usize = 4096;

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/136.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 13_6) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
];

lazy_static! {
    static ref TITLE_RE: Regex = Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap();
}

pub fn random_user_agent() -> &'static str {
    USER_AGENTS[fastrand::usize(..USER_AGENTS.len())]
}

/// Random lowercase hex string of `bytes` bytes.
pub fn random_hex(bytes: usize) -> String {
    (0..bytes).map(|_| format!("{:02x}", fastrand::u8(..))).collect()
}

#[derive(Debug, Clone)]
pub struct FetcherOptions {
    /// Random pick from a small pool when unset.
    pub user_agent: Option<String>,
    pub referer: Option<String>,
    pub cookie: Option<String>,
    pub accept_language: String,
    /// Send Chromium client hints and `Sec-Fetch-*` navigation headers.
    pub client_hints: bool,
    pub timeout: Duration,
}

impl Default for FetcherOptions {
    fn default() -> Self {
        Self {
            user_agent: None,
            referer: None,
            cookie: None,
            accept_language: "zh-CN,zh;q=0.9,en;q=0.8,ru;q=0.7".to_string(),
            client_hints: false,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    headers: HeaderMap,
}

impl HttpFetcher {
    pub fn new(options: FetcherOptions) -> ScrapeResult<Self> {
        let user_agent = options
            .user_agent
            .as_deref()
            .map(str::trim)
            .filter(|ua| !ua.is_empty())
            .unwrap_or_else(|| random_user_agent())
            .to_string();

        let mut headers = HeaderMap::new();
        insert(&mut headers, header::USER_AGENT, "User-Agent", &user_agent)?;
        insert(
            &mut headers,
            header::ACCEPT,
            "Accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
        )?;
        insert(
            &mut headers,
            header::ACCEPT_LANGUAGE,
            "Accept-Language",
            &options.accept_language,
        )?;
        if options.client_hints {
            insert(&mut headers, header::CACHE_CONTROL, "Cache-Control", "max-age=0")?;
            insert(
                &mut headers,
                header::UPGRADE_INSECURE_REQUESTS,
                "Upgrade-Insecure-Requests",
                "1",
            )?;
            for (name, value) in [
                (
                    "sec-ch-ua",
                    r#""Chromium";v="136", "Not.A/Brand";v="99""#,
                ),
                ("sec-ch-ua-mobile", "?0"),
                ("sec-ch-ua-platform", r#""Linux""#),
                ("sec-fetch-dest", "document"),
                ("sec-fetch-mode", "navigate"),
                ("sec-fetch-user", "?1"),
                ("sec-fetch-site", "same-origin"),
            ] {
                insert(&mut headers, HeaderName::from_static(name), name, value)?;
            }
        }
        if let Some(referer) = options.referer.as_deref().filter(|r| !r.trim().is_empty()) {
            insert(&mut headers, header::REFERER, "Referer", referer.trim())?;
        }
        if let Some(cookie) = options.cookie.as_deref().filter(|c| !c.trim().is_empty()) {
            insert(&mut headers, header::COOKIE, "Cookie", cookie.trim())?;
        }

        let client = reqwest::Client::builder()
            .timeout(options.timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(ScrapeError::Client)?;

        Ok(Self { client, headers })
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Fetch a page and return its decoded, trimmed HTML.
    pub async fn get(&self, url: &str) -> ScrapeResult<String> {
        let http_err = |source| ScrapeError::Http {
            url: url.to_string(),
            source,
        };

        let resp = self
            .client
            .get(url)
            .headers(self.headers.clone())
            .send()
            .await
            .map_err(http_err)?;

        let status = resp.status();
        let final_url = resp.url().to_string();
        let body = resp.text().await.map_err(http_err)?;

        let title = page_title(&body);
        if looks_like_cloudflare_challenge(&final_url, &title, head_snippet(&body)) {
            return Err(ScrapeError::Challenge {
                url: final_url,
                title,
            });
        }

        if !status.is_success() {
            return Err(ScrapeError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body: parser_client::error::truncate_body(&body, MAX_STATUS_BODY),
            });
        }

        debug!(url, bytes = body.len(), "Fetched page");
        Ok(body.trim().to_string())
    }
}

fn insert(
    headers: &mut HeaderMap,
    name: HeaderName,
    label: &'static str,
    value: &str,
) -> ScrapeResult<()> {
    let value = HeaderValue::from_str(value).map_err(|_| ScrapeError::InvalidHeader { name: label })?;
    headers.insert(name, value);
    Ok(())
}

fn page_title(html: &str) -> String {
    TITLE_RE
        .captures(head_snippet(html))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}

fn head_snippet(html: &str) -> &str {
    let mut end = html.len().min(CHALLENGE_SNIPPET_BYTES);
    while !html.is_char_boundary(end) {
        end -= 1;
    }
    &html[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_hex_length_and_alphabet() {
        let hex = random_hex(16);
        assert_eq!(hex.len(), 32);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_default_headers_use_random_pool_agent() {
        let fetcher = HttpFetcher::new(FetcherOptions::default()).unwrap();
        let ua = fetcher.headers()[header::USER_AGENT].to_str().unwrap();
        assert!(USER_AGENTS.contains(&ua));
        assert!(fetcher.headers().get(header::COOKIE).is_none());
    }

    #[test]
    fn test_explicit_headers_are_applied() {
        let fetcher = HttpFetcher::new(FetcherOptions {
            user_agent: Some("TestAgent/1.0".into()),
            referer: Some("https://101kks.com/".into()),
            cookie: Some(" cf_clearance=abc ".into()),
            client_hints: true,
            ..Default::default()
        })
        .unwrap();
        let headers = fetcher.headers();
        assert_eq!(headers[header::USER_AGENT], "TestAgent/1.0");
        assert_eq!(headers[header::REFERER], "https://101kks.com/");
        assert_eq!(headers[header::COOKIE], "cf_clearance=abc");
        assert_eq!(headers["sec-fetch-mode"], "navigate");
    }

    #[test]
    fn test_blank_user_agent_falls_back_to_pool() {
        let options = FetcherOptions {
            user_agent: Some("   ".to_string()),
            ..Default::default()
        };
        let fetcher = HttpFetcher::new(options).unwrap();
        let ua = fetcher.headers()[header::USER_AGENT].to_str().unwrap();
        assert!(USER_AGENTS.contains(&ua));
    }

    #[test]
    fn test_invalid_cookie_is_rejected() {
        let err = HttpFetcher::new(FetcherOptions {
            cookie: Some("a=b\nc".into()),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, ScrapeError::InvalidHeader { name: "Cookie" }));
    }

    #[test]
    fn test_page_title_extraction() {
        assert_eq!(
            page_title("<html><head><TITLE>\n Just a moment... </TITLE></head>"),
            "Just a moment..."
        );
        assert_eq!(page_title("<html></html>"), "");
    }
}

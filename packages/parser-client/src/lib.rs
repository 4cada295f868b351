//! Pure REST client for the headless-browser parse service.
//!
//! The service renders a book page (and every chapter page) in a real browser and
//! returns the extracted book and chapter bodies in one response. Requests can take
//! many minutes for large books, so the client sets no timeout of its own: callers
//! bound the call with their own cancellation.
//!
//! # Example
//!
//! ```rust,ignore
//! use parser_client::{ParseRequest, ParserClient};
//!
//! let client = ParserClient::new("http://parser-service:8000");
//! let resp = client
//!     .parse(&ParseRequest {
//!         url: "https://101kks.com/book/12544.html".into(),
//!         site: Some("101kks".into()),
//!         ..Default::default()
//!     })
//!     .await?;
//! println!("{} chapters", resp.chapters.len());
//! ```

pub mod error;
pub mod types;

pub use error::{ParserError, Result};
pub use types::{BookInfo, ChapterPayload, ChapterRef, ParseRequest, ParseResponse};

/// Default base URL inside the compose network.
pub const DEFAULT_BASE_URL: &str = "http://parser-service:8000";

#[derive(Debug, Clone)]
pub struct ParserClient {
    client: reqwest::Client,
    base_url: String,
}

impl ParserClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        let base_url = base_url.trim_end_matches('/').to_string();
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Render a book and its chapters.
    pub async fn parse(&self, req: &ParseRequest) -> Result<ParseResponse> {
        let url = format!("{}/parse", self.base_url);
        tracing::debug!(target_url = %req.url, site = ?req.site, "Sending parse request");

        let resp = self.client.post(&url).json(req).send().await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(ParserError::Api {
                status: status.as_u16(),
                body: error::truncate_body(&body, error::MAX_ERROR_BODY),
            });
        }

        let parsed: ParseResponse = serde_json::from_str(&body)?;
        tracing::debug!(
            site = %parsed.site,
            chapters = parsed.chapters.len(),
            "Parse request completed"
        );
        Ok(parsed)
    }
}

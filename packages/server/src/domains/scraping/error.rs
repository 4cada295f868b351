use thiserror::Error;

/// Maximum number of body bytes kept in a [`ScrapeError::Status`] message.
pub const MAX_STATUS_BODY: usize = 2048;

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("invalid header value for {name}")]
    InvalidHeader { name: &'static str },

    #[error("GET {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("GET {url}: status={status} body={body:?}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("cloudflare challenge url={url} title={title:?}")]
    Challenge { url: String, title: String },

    #[error("parse {url}: {message}")]
    Parse { url: String, message: String },

    #[error(transparent)]
    Remote(#[from] parser_client::ParserError),

    #[error("{0}")]
    Incomplete(String),
}

impl ScrapeError {
    pub fn parse(url: &str, message: impl Into<String>) -> Self {
        Self::Parse {
            url: url.to_string(),
            message: message.into(),
        }
    }
}

pub type ScrapeResult<T> = std::result::Result<T, ScrapeError>;

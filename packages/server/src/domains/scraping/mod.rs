//! Site scraping adapters.
//!
//! Every adapter implements [`BaseBookScraper`](crate::kernel::BaseBookScraper):
//! direct fetchers parse HTML fetched with reqwest, the remote adapter delegates
//! to the headless parse service for sites behind anti-bot challenges.

pub mod challenge;
pub mod error;
pub mod fanqie;
pub mod fetcher;
mod html;
pub mod kks101;
pub mod remote;
pub mod storage_state;
pub mod text;
pub mod types;

pub use error::{ScrapeError, ScrapeResult};
pub use fanqie::FanqieScraper;
pub use fetcher::{FetcherOptions, HttpFetcher};
pub use kks101::Kks101Scraper;
pub use remote::{RemoteBrowserScraper, RemoteOptions};
pub use types::{Book, Chapter, ChapterRef};

use serde::{Deserialize, Serialize};

/// Book metadata and chapter listing as scraped from a source site.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub title: String,
    pub cover_url: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub catalog_url: Option<String>,
    /// In listing order.
    pub chapters: Vec<ChapterRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterRef {
    pub url: String,
    pub title: String,
    /// Site-declared chapter number, when the listing carries one.
    pub number: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub url: String,
    pub title: String,
    pub content: String,
}

//! Write path for imported novels and chapters.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use tracing::info;

use super::models::{ChapterContent, ChapterRow, Novel, NovelLocalization, NovelTaxonomy};
use super::slug::disambiguate;
use crate::common::{ChapterId, NovelId};

/// Placeholder used wherever the source has no value yet.
pub const PARSER_SENTINEL: &str = "parser";

/// Every locale gets a localization row at import time.
pub const LOCALIZATION_LANGS: &[&str] = &["ru", "en", "zh", "ja", "ko", "fr", "de"];

/// Language of the scraped text.
pub const SOURCE_LANG: &str = "zh";
/// Primary platform locale; holds a copy of the source text until translated.
pub const PRIMARY_LANG: &str = "ru";

/// Everything written by the one-time novel creation transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct NovelShell {
    pub id: NovelId,
    pub slug: String,
    pub title: String,
    pub description: Option<String>,
    pub author: Option<String>,
    pub chapters_count: i32,
    pub cover_key: Option<String>,
}

impl NovelShell {
    fn sentinel_or(value: Option<&str>) -> String {
        value
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(PARSER_SENTINEL)
            .to_string()
    }

    pub fn author_or_sentinel(&self) -> String {
        Self::sentinel_or(self.author.as_deref())
    }

    /// Same title and description for every supported locale.
    pub fn localizations(&self) -> Vec<NovelLocalization> {
        let title = Self::sentinel_or(Some(&self.title));
        let description = Self::sentinel_or(self.description.as_deref());
        LOCALIZATION_LANGS
            .iter()
            .map(|lang| NovelLocalization {
                novel_id: self.id,
                lang: lang.to_string(),
                title: title.clone(),
                description: Some(description.clone()),
                alt_titles: vec![PARSER_SENTINEL.to_string()],
            })
            .collect()
    }
}

/// One chapter ready to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct ChapterRecord {
    pub novel_id: NovelId,
    pub number: i32,
    pub title: Option<String>,
    pub content: String,
}

impl ChapterRecord {
    pub fn word_count(&self) -> i32 {
        i32::try_from(self.content.chars().count()).unwrap_or(i32::MAX)
    }

    /// Source-language row plus the primary-locale copy.
    pub fn contents(&self, chapter_id: ChapterId) -> Vec<ChapterContent> {
        [SOURCE_LANG, PRIMARY_LANG]
            .into_iter()
            .map(|lang| ChapterContent {
                chapter_id,
                lang: lang.to_string(),
                content: self.content.clone(),
                word_count: self.word_count(),
                source: PARSER_SENTINEL.to_string(),
            })
            .collect()
    }
}

#[async_trait]
pub trait NovelStore: Send + Sync {
    /// Create the novel row with localizations and placeholder taxonomy in one
    /// transaction. Returns the slug actually stored, which differs from
    /// `shell.slug` when another novel already owns it.
    async fn create_novel_shell(&self, shell: &NovelShell) -> Result<String>;

    /// Upsert the chapter and its contents in one short transaction.
    async fn upsert_chapter(&self, chapter: &ChapterRecord) -> Result<ChapterId>;
}

#[derive(Clone)]
pub struct PgNovelStore {
    pool: PgPool,
}

impl PgNovelStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NovelStore for PgNovelStore {
    async fn create_novel_shell(&self, shell: &NovelShell) -> Result<String> {
        let mut tx = self.pool.begin().await.context("Failed to begin novel transaction")?;

        let mut slug = shell.slug.clone();
        if Novel::slug_taken(&slug, shell.id, &mut tx).await? {
            slug = disambiguate(&slug, shell.id);
            info!(novel_id = %shell.id, slug = %slug, "Slug taken, using disambiguated slug");
        }

        Novel::insert_shell(
            shell.id,
            &slug,
            shell.chapters_count,
            &shell.author_or_sentinel(),
            shell.cover_key.as_deref(),
            &mut tx,
        )
        .await?;
        NovelTaxonomy::link_placeholder(shell.id, PARSER_SENTINEL, &mut tx).await?;
        for localization in shell.localizations() {
            localization.upsert(&mut tx).await?;
        }

        tx.commit().await.context("Failed to commit novel")?;
        Ok(slug)
    }

    async fn upsert_chapter(&self, chapter: &ChapterRecord) -> Result<ChapterId> {
        let mut tx = self.pool.begin().await.context("Failed to begin chapter transaction")?;
        let chapter_id = ChapterRow::upsert(
            chapter.novel_id,
            chapter.number,
            chapter.title.as_deref(),
            Utc::now(),
            &mut tx,
        )
        .await?;
        for content in chapter.contents(chapter_id) {
            content.upsert(&mut tx).await?;
        }
        tx.commit().await.context("Failed to commit chapter")?;
        Ok(chapter_id)
    }
}

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use crate::common::{ChapterId, NovelId};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ChapterRow {
    pub id: ChapterId,
    pub novel_id: NovelId,
    pub number: i32,
    pub title: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

impl ChapterRow {
    /// Insert or update the chapter keyed by `(novel_id, number)` and return
    /// the id of the stored row.
    pub async fn upsert(
        novel_id: NovelId,
        number: i32,
        title: Option<&str>,
        published_at: DateTime<Utc>,
        conn: &mut PgConnection,
    ) -> Result<ChapterId> {
        sqlx::query_scalar(
            r#"
            INSERT INTO chapters (id, novel_id, number, title, published_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (novel_id, number) DO UPDATE SET
                title = EXCLUDED.title,
                published_at = EXCLUDED.published_at,
                updated_at = NOW()
            RETURNING id
            "#,
        )
        .bind(ChapterId::new())
        .bind(novel_id)
        .bind(number)
        .bind(title)
        .bind(published_at)
        .fetch_one(conn)
        .await
        .context("Failed to upsert chapter")
    }

    pub async fn find_by_novel(novel_id: NovelId, pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT id, novel_id, number, title, published_at FROM chapters WHERE novel_id = $1 ORDER BY number",
        )
        .bind(novel_id)
        .fetch_all(pool)
        .await
        .context("Failed to load chapters")
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ChapterContent {
    pub chapter_id: ChapterId,
    pub lang: String,
    pub content: String,
    pub word_count: i32,
    pub source: String,
}

impl ChapterContent {
    pub async fn upsert(&self, conn: &mut PgConnection) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO chapter_contents (chapter_id, lang, content, word_count, source)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (chapter_id, lang) DO UPDATE SET
                content = EXCLUDED.content,
                word_count = EXCLUDED.word_count,
                source = EXCLUDED.source,
                updated_at = NOW()
            "#,
        )
        .bind(self.chapter_id)
        .bind(&self.lang)
        .bind(&self.content)
        .bind(self.word_count)
        .bind(&self.source)
        .execute(conn)
        .await
        .with_context(|| format!("Failed to upsert chapter content ({})", self.lang))?;
        Ok(())
    }

    pub async fn find_by_chapter(chapter_id: ChapterId, pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT chapter_id, lang, content, word_count, source FROM chapter_contents WHERE chapter_id = $1 ORDER BY lang",
        )
        .bind(chapter_id)
        .fetch_all(pool)
        .await
        .context("Failed to load chapter contents")
    }
}

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::common::NovelId;

/// Status given to freshly imported novels.
pub const STATUS_ONGOING: &str = "ongoing";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Novel {
    pub id: NovelId,
    pub slug: String,
    pub translation_status: String,
    pub original_chapters_count: i32,
    pub author: Option<String>,
    pub cover_image_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Novel {
    pub async fn find_by_id(id: NovelId, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM novels WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("Failed to load novel")
    }

    /// True when another novel already owns `slug`.
    pub async fn slug_taken(slug: &str, except: NovelId, conn: &mut PgConnection) -> Result<bool> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM novels WHERE slug = $1 AND id <> $2)")
            .bind(slug)
            .bind(except)
            .fetch_one(conn)
            .await
            .context("Failed to check slug")
    }

    /// Insert the novel row. Re-running for an existing id is a no-op.
    pub async fn insert_shell(
        id: NovelId,
        slug: &str,
        original_chapters_count: i32,
        author: &str,
        cover_image_key: Option<&str>,
        conn: &mut PgConnection,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO novels (id, slug, translation_status, original_chapters_count, author, cover_image_key)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(slug)
        .bind(STATUS_ONGOING)
        .bind(original_chapters_count)
        .bind(author)
        .bind(cover_image_key)
        .execute(conn)
        .await
        .context("Failed to insert novel")?;
        Ok(())
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct NovelLocalization {
    pub novel_id: NovelId,
    pub lang: String,
    pub title: String,
    pub description: Option<String>,
    pub alt_titles: Vec<String>,
}

impl NovelLocalization {
    pub async fn upsert(&self, conn: &mut PgConnection) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO novel_localizations (novel_id, lang, title, description, alt_titles)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (novel_id, lang) DO UPDATE SET
                title = EXCLUDED.title,
                description = EXCLUDED.description,
                alt_titles = EXCLUDED.alt_titles,
                updated_at = NOW()
            "#,
        )
        .bind(self.novel_id)
        .bind(&self.lang)
        .bind(&self.title)
        .bind(&self.description)
        .bind(&self.alt_titles)
        .execute(conn)
        .await
        .with_context(|| format!("Failed to upsert localization ({})", self.lang))?;
        Ok(())
    }

    pub async fn find_by_novel(novel_id: NovelId, pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT novel_id, lang, title, description, alt_titles FROM novel_localizations WHERE novel_id = $1 ORDER BY lang",
        )
        .bind(novel_id)
        .fetch_all(pool)
        .await
        .context("Failed to load localizations")
    }
}

/// Placeholder genre and tag links for imported novels awaiting curation.
pub struct NovelTaxonomy;

impl NovelTaxonomy {
    pub async fn link_placeholder(novel_id: NovelId, slug: &str, conn: &mut PgConnection) -> Result<()> {
        let genre_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO genres (slug) VALUES ($1)
            ON CONFLICT (slug) DO UPDATE SET slug = EXCLUDED.slug
            RETURNING id
            "#,
        )
        .bind(slug)
        .fetch_one(&mut *conn)
        .await
        .context("Failed to ensure placeholder genre")?;

        sqlx::query("INSERT INTO novel_genres (novel_id, genre_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(novel_id)
            .bind(genre_id)
            .execute(&mut *conn)
            .await
            .context("Failed to link placeholder genre")?;

        let tag_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO tags (slug) VALUES ($1)
            ON CONFLICT (slug) DO UPDATE SET slug = EXCLUDED.slug
            RETURNING id
            "#,
        )
        .bind(slug)
        .fetch_one(&mut *conn)
        .await
        .context("Failed to ensure placeholder tag")?;

        sqlx::query("INSERT INTO novel_tags (novel_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(novel_id)
            .bind(tag_id)
            .execute(&mut *conn)
            .await
            .context("Failed to link placeholder tag")?;
        Ok(())
    }
}

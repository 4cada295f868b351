//! Catalog write path against Postgres: novel shell and chapter upserts.

mod common;

use crate::common::TestHarness;
use ingest_core::common::NovelId;
use ingest_core::domains::importing::models::{ChapterContent, ChapterRow, Novel, NovelLocalization};
use ingest_core::domains::importing::store::LOCALIZATION_LANGS;
use ingest_core::domains::importing::{ChapterRecord, NovelShell, NovelStore, PgNovelStore};
use test_context::test_context;

fn shell(slug: &str) -> NovelShell {
    NovelShell {
        id: NovelId::new(),
        slug: slug.to_string(),
        title: "斗破苍穹".to_string(),
        description: Some("天才少年".to_string()),
        author: Some("天蚕土豆".to_string()),
        chapters_count: 2,
        cover_key: Some("covers/test.jpg".to_string()),
    }
}

#[test_context(TestHarness)]
#[tokio::test]
async fn novel_shell_writes_novel_localizations_and_taxonomy(ctx: &TestHarness) {
    let store = PgNovelStore::new(ctx.db_pool.clone());
    let shell = shell(&format!("doupo-{}", NovelId::new().short_hex(6)));

    let slug = store.create_novel_shell(&shell).await.unwrap();

    assert_eq!(slug, shell.slug);
    let novel = Novel::find_by_id(shell.id, &ctx.db_pool).await.unwrap().unwrap();
    assert_eq!(novel.translation_status, "ongoing");
    assert_eq!(novel.original_chapters_count, 2);
    assert_eq!(novel.author.as_deref(), Some("天蚕土豆"));
    assert_eq!(novel.cover_image_key.as_deref(), Some("covers/test.jpg"));

    let localizations = NovelLocalization::find_by_novel(shell.id, &ctx.db_pool).await.unwrap();
    assert_eq!(localizations.len(), LOCALIZATION_LANGS.len());

    let genres: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM novel_genres WHERE novel_id = $1")
        .bind(shell.id)
        .fetch_one(&ctx.db_pool)
        .await
        .unwrap();
    let tags: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM novel_tags WHERE novel_id = $1")
        .bind(shell.id)
        .fetch_one(&ctx.db_pool)
        .await
        .unwrap();
    assert_eq!((genres, tags), (1, 1));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn taken_slug_is_disambiguated(ctx: &TestHarness) {
    let store = PgNovelStore::new(ctx.db_pool.clone());
    let base = format!("shared-{}", NovelId::new().short_hex(6));
    let first = shell(&base);
    let second = shell(&base);

    let first_slug = store.create_novel_shell(&first).await.unwrap();
    let second_slug = store.create_novel_shell(&second).await.unwrap();

    assert_eq!(first_slug, base);
    assert_ne!(second_slug, base);
    assert!(second_slug.starts_with(&format!("{}-", base)));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn chapter_upsert_is_idempotent(ctx: &TestHarness) {
    let store = PgNovelStore::new(ctx.db_pool.clone());
    let shell = shell(&format!("upsert-{}", NovelId::new().short_hex(6)));
    store.create_novel_shell(&shell).await.unwrap();

    let mut record = ChapterRecord {
        novel_id: shell.id,
        number: 1,
        title: Some("第一章".to_string()),
        content: "旧的内容".to_string(),
    };
    let first = store.upsert_chapter(&record).await.unwrap();
    record.content = "新的内容".to_string();
    let second = store.upsert_chapter(&record).await.unwrap();

    assert_eq!(first, second);
    let rows = ChapterRow::find_by_novel(shell.id, &ctx.db_pool).await.unwrap();
    assert_eq!(rows.len(), 1);

    let contents = ChapterContent::find_by_chapter(first, &ctx.db_pool).await.unwrap();
    let langs: Vec<_> = contents.iter().map(|c| c.lang.as_str()).collect();
    assert_eq!(langs, vec!["ru", "zh"]);
    assert!(contents.iter().all(|c| c.content == "新的内容"));
    assert!(contents.iter().all(|c| c.word_count == 4));
}

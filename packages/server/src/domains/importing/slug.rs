//! URL-safe novel slugs.

use crate::common::NovelId;

pub const MAX_SLUG_LEN: usize = 255;

/// Lowercase ASCII slug: titles are transliterated, every run of other
/// characters becomes one `-`, and leading/trailing dashes are dropped.
pub fn slugify(title: &str) -> String {
    let ascii = deunicode::deunicode(title);
    let mut slug = String::with_capacity(ascii.len());
    let mut pending_dash = false;
    for c in ascii.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Slug for a new novel, never empty and at most [`MAX_SLUG_LEN`] bytes.
pub fn generate_slug(title: &str, novel_id: NovelId) -> String {
    let mut slug = slugify(title.trim());
    if slug.is_empty() {
        slug = format!("novel-{}", novel_id.short_hex(8));
    }
    if slug.len() > MAX_SLUG_LEN {
        slug.truncate(MAX_SLUG_LEN);
        while slug.ends_with('-') {
            slug.pop();
        }
    }
    slug
}

/// Variant used when `slug` is already taken by another novel.
pub fn disambiguate(slug: &str, novel_id: NovelId) -> String {
    let suffix = format!("-{}", novel_id.short_hex(8));
    let mut base = slug.to_string();
    base.truncate(MAX_SLUG_LEN - suffix.len());
    while base.ends_with('-') {
        base.pop();
    }
    format!("{base}{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_ascii() {
        assert_eq!(slugify("  The Legendary   Mechanic!! "), "the-legendary-mechanic");
    }

    #[test]
    fn test_slugify_transliterates() {
        let slug = slugify("斗破苍穹");
        assert!(!slug.is_empty());
        assert!(slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
        assert_eq!(slugify("Мастер меча"), "master-mecha");
    }

    #[test]
    fn test_empty_title_falls_back_to_novel_id() {
        let id = NovelId::parse("0191e3a4-5b6c-7d8e-9f00-112233445566").unwrap();
        assert_eq!(generate_slug("", id), "novel-33445566");
        assert_eq!(generate_slug("   \t ", id), "novel-33445566");
        assert_eq!(generate_slug("!!!", id), "novel-33445566");
    }

    #[test]
    fn test_fallback_shape_for_fresh_ids() {
        let slug = generate_slug(" ", NovelId::new());
        let hex = slug.strip_prefix("novel-").unwrap();
        assert_eq!(hex.len(), 8);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_truncates_to_max_len() {
        let title = "word ".repeat(200);
        let slug = generate_slug(&title, NovelId::new());
        assert!(slug.len() <= MAX_SLUG_LEN);
        assert!(!slug.ends_with('-'));
    }

    #[test]
    fn test_disambiguate_appends_id() {
        let id = NovelId::parse("0191e3a4-5b6c-7d8e-9f00-112233445566").unwrap();
        assert_eq!(disambiguate("doupo", id), "doupo-33445566");
        assert!(disambiguate(&"a".repeat(255), id).len() <= MAX_SLUG_LEN);
    }
}

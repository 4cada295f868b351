//! Heuristics for recognizing a Cloudflare interstitial instead of real content.

const CHALLENGE_TITLES: &[&str] = &[
    "just a moment...",
    "attention required!",
    "access denied",
    "один момент…",
    "один момент",
];

const CHALLENGE_TITLE_PREFIXES: &[&str] = &["just a moment", "один момент"];

const CHALLENGE_SNIPPETS: &[&str] = &[
    "cf-turnstile",
    "challenge-platform",
    "just a moment",
    "один момент",
];

pub fn looks_like_cloudflare_challenge(page_url: &str, title: &str, html_snippet: &str) -> bool {
    let url = page_url.to_lowercase();
    if url.contains("__cf_chl")
        || url.contains("/cdn-cgi/challenge-platform/")
        || url.contains("challenges.cloudflare.com")
    {
        return true;
    }

    let title = title.trim().to_lowercase();
    if CHALLENGE_TITLES.contains(&title.as_str())
        || CHALLENGE_TITLE_PREFIXES.iter().any(|p| title.starts_with(p))
    {
        return true;
    }

    let snippet = html_snippet.to_lowercase();
    CHALLENGE_SNIPPETS.iter().any(|s| snippet.contains(s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_challenge_url_markers() {
        assert!(looks_like_cloudflare_challenge(
            "https://101kks.com/book/1.html?__cf_chl_rt_tk=abc",
            "",
            ""
        ));
        assert!(looks_like_cloudflare_challenge(
            "https://challenges.cloudflare.com/turnstile/v0",
            "",
            ""
        ));
    }

    #[test]
    fn test_challenge_titles() {
        assert!(looks_like_cloudflare_challenge("https://x.com", "Just a moment...", ""));
        assert!(looks_like_cloudflare_challenge("https://x.com", "Один момент…", ""));
        assert!(looks_like_cloudflare_challenge("https://x.com", " Attention Required! ", ""));
    }

    #[test]
    fn test_challenge_snippet() {
        assert!(looks_like_cloudflare_challenge(
            "https://x.com",
            "",
            r#"<div class="cf-turnstile" data-sitekey="x"></div>"#
        ));
    }

    #[test]
    fn test_normal_page_is_not_challenge() {
        assert!(!looks_like_cloudflare_challenge(
            "https://101kks.com/book/12544.html",
            "斗破苍穹 - 101看书",
            "<html><head><meta charset=utf-8></head>"
        ));
    }
}

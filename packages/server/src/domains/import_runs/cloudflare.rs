//! Anti-bot failure classification from error text.

const MARKERS: &[&str] = &[
    "cloudflare",
    "cf_clearance",
    "403 blocked",
    "blocked by cloudflare",
    "cloudflare challenge",
    "turnstile",
];

/// True when the error text carries a known Cloudflare blocking marker.
pub fn is_cloudflare_error(message: &str) -> bool {
    if message.is_empty() {
        return false;
    }
    let lower = message.to_lowercase();
    MARKERS.iter().any(|marker| lower.contains(marker))
}

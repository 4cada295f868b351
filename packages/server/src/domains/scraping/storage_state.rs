//! Cookie header extraction from a Playwright `storage_state` file.
//!
//! Reuses a browser session the operator exported after passing a challenge
//! by hand, so direct fetches carry the same clearance cookies.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use url::Url;

#[derive(Debug, Deserialize)]
struct StorageState {
    #[serde(default)]
    cookies: Vec<StoredCookie>,
}

#[derive(Debug, Deserialize)]
struct StoredCookie {
    #[serde(default)]
    name: String,
    #[serde(default)]
    value: String,
    #[serde(default)]
    domain: String,
    #[serde(default)]
    path: String,
}

impl StoredCookie {
    fn matches(&self, host: &str, path: &str) -> bool {
        let domain = self.domain.trim().to_lowercase();
        let domain_ok = match domain.strip_prefix('.') {
            Some(bare) => host == bare || host.ends_with(&domain),
            None => host == domain || host.ends_with(&format!(".{domain}")),
        };
        let cookie_path = match self.path.trim() {
            "" => "/",
            p => p,
        };
        domain_ok && path.starts_with(cookie_path)
    }
}

/// Build a `Cookie` header for `target_url` from the storage-state JSON text.
pub fn cookie_header_from_json(json: &str, target_url: &str) -> Result<String> {
    let state: StorageState = serde_json::from_str(json).context("parse storage_state")?;
    let url = Url::parse(target_url.trim()).context("parse target url")?;
    let host = url.host_str().unwrap_or_default().to_lowercase();
    let path = match url.path() {
        "" => "/",
        p => p,
    };

    let mut seen = HashSet::new();
    let parts: Vec<String> = state
        .cookies
        .iter()
        .filter(|c| !c.name.trim().is_empty() && !c.value.is_empty())
        .filter(|c| c.matches(&host, path))
        .filter(|c| seen.insert(c.name.trim().to_string()))
        .map(|c| format!("{}={}", c.name.trim(), c.value))
        .collect();

    Ok(parts.join("; "))
}

/// Read a storage-state file and build a `Cookie` header for `target_url`.
pub async fn cookie_header_from_storage_state(path: &Path, target_url: &str) -> Result<String> {
    let json = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("read storage_state {}", path.display()))?;
    cookie_header_from_json(&json, target_url)
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATE: &str = r#"{
        "cookies": [
            {"name": "cf_clearance", "value": "abc", "domain": ".101kks.com", "path": "/"},
            {"name": "zh_choose", "value": "t", "domain": "101kks.com", "path": "/"},
            {"name": "scoped", "value": "1", "domain": "101kks.com", "path": "/txt"},
            {"name": "other", "value": "x", "domain": "example.com", "path": "/"},
            {"name": "cf_clearance", "value": "dupe", "domain": "101kks.com", "path": "/"},
            {"name": "empty", "value": "", "domain": "101kks.com", "path": "/"}
        ],
        "origins": []
    }"#;

    #[test]
    fn test_matches_domain_and_path() {
        let header = cookie_header_from_json(STATE, "https://101kks.com/book/1.html").unwrap();
        assert_eq!(header, "cf_clearance=abc; zh_choose=t");
    }

    #[test]
    fn test_path_scoped_cookie_included_under_prefix() {
        let header = cookie_header_from_json(STATE, "https://101kks.com/txt/1/2.html").unwrap();
        assert_eq!(header, "cf_clearance=abc; zh_choose=t; scoped=1");
    }

    #[test]
    fn test_subdomain_matches_dot_domain() {
        let header = cookie_header_from_json(STATE, "https://www.101kks.com/").unwrap();
        assert_eq!(header, "cf_clearance=abc; zh_choose=t");
    }

    #[test]
    fn test_invalid_json_is_error() {
        assert!(cookie_header_from_json("{not json", "https://101kks.com/").is_err());
    }

    #[tokio::test]
    async fn test_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("101kks_storage.json");
        tokio::fs::write(&path, STATE).await.unwrap();

        let header = cookie_header_from_storage_state(&path, "https://101kks.com/")
            .await
            .unwrap();
        assert!(header.starts_with("cf_clearance=abc"));
    }
}

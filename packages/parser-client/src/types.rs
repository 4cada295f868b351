use serde::{Deserialize, Serialize};

/// Request body for `POST /parse`.
///
/// Optional fields are omitted from the JSON so the service applies its own
/// defaults.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ParseRequest {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,
    #[serde(skip_serializing_if = "is_zero")]
    pub chapters_limit: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cookie_header: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_state_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub navigation_timeout_ms: Option<u32>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub humanize: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewport_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewport_height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub human_delay_ms_min: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub human_delay_ms_max: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloudflare_wait_ms: Option<u32>,
}

fn is_zero(value: &u32) -> bool {
    *value == 0
}

/// Chapter reference as listed in the book catalog.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ChapterRef {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub number: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookInfo {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub cover_url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub catalog_url: Option<String>,
    #[serde(default)]
    pub chapters: Vec<ChapterRef>,
}

/// Rendered chapter body.
#[derive(Debug, Clone, Deserialize)]
pub struct ChapterPayload {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParseResponse {
    pub site: String,
    pub book: BookInfo,
    #[serde(default)]
    pub chapters: Vec<ChapterPayload>,
    #[serde(default)]
    pub debug: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_omits_unset_fields() {
        let req = ParseRequest {
            url: "https://101kks.com/book/1.html".into(),
            site: Some("101kks".into()),
            ..Default::default()
        };
        let json = serde_json::to_value(&req).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 2);
        assert_eq!(obj["site"], "101kks");
    }

    #[test]
    fn test_request_uses_snake_case_wire_names() {
        let req = ParseRequest {
            url: "u".into(),
            chapters_limit: 3,
            humanize: true,
            timezone_id: Some("Europe/Moscow".into()),
            cloudflare_wait_ms: Some(12_000),
            ..Default::default()
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["chapters_limit"], 3);
        assert_eq!(json["humanize"], true);
        assert_eq!(json["timezone_id"], "Europe/Moscow");
        assert_eq!(json["cloudflare_wait_ms"], 12_000);
    }

    #[test]
    fn test_response_tolerates_missing_optional_fields() {
        let raw = r#"{
            "site": "tadu",
            "book": {
                "title": "Book",
                "chapters": [{"url": "https://tadu.com/c/1", "title": "One"}]
            },
            "chapters": [{"url": "https://tadu.com/c/1", "title": "One", "content": "text"}]
        }"#;
        let resp: ParseResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(resp.book.chapters[0].number, None);
        assert!(resp.book.tags.is_empty());
        assert!(resp.debug.is_none());
        assert_eq!(resp.chapters[0].content, "text");
    }
}

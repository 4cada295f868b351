use thiserror::Error;

/// Maximum number of body bytes kept in an [`ParserError::Api`] message.
pub const MAX_ERROR_BODY: usize = 4096;

#[derive(Debug, Error)]
pub enum ParserError {
    #[error("parser-service request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("parser-service: status={status} body={body:?}")]
    Api { status: u16, body: String },

    #[error("parser-service: invalid response: {0}")]
    Decode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ParserError>;

/// Truncate a response body on a char boundary so error text stays bounded.
pub fn truncate_body(body: &str, max: usize) -> String {
    if body.len() <= max {
        return body.to_string();
    }
    let mut end = max;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    body[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_body_short_is_unchanged() {
        assert_eq!(truncate_body("blocked", 4096), "blocked");
    }

    #[test]
    fn test_truncate_body_respects_char_boundary() {
        // Each CJK char is 3 bytes; cutting at 4 must back off to 3.
        assert_eq!(truncate_body("第一章", 4), "第");
    }

    #[test]
    fn test_api_error_display_keeps_status_and_body() {
        let err = ParserError::Api {
            status: 403,
            body: "cloudflare challenge phase=book".into(),
        };
        let text = err.to_string();
        assert!(text.contains("status=403"));
        assert!(text.contains("cloudflare challenge"));
    }
}

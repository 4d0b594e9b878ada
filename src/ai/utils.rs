//! Shared utilities for provider clients

use serde_json::Value;

/// Longest provider error body carried into an error message
const MAX_ERROR_TEXT: usize = 500;

/// Extract a readable error message from a provider error body
///
/// Handles:
/// - `{"detail": "..."}` (FastAPI-style upload services)
/// - `{"error": "..."}`
/// - `{"error": {"message": "..."}}` (Google-style APIs)
/// - anything else: the raw body, shortened
pub fn provider_error_text(body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<Value>(body) {
        let candidates = [
            json.get("detail"),
            json.get("error").and_then(|e| e.get("message")),
            json.get("error"),
            json.get("message"),
        ];

        for value in candidates.into_iter().flatten() {
            if let Some(text) = value.as_str().filter(|t| !t.trim().is_empty()) {
                return shorten(text.trim());
            }
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "empty response body".to_string();
    }
    shorten(trimmed)
}

/// Shorten text to `MAX_ERROR_TEXT` characters on a char boundary
fn shorten(text: &str) -> String {
    match text.char_indices().nth(MAX_ERROR_TEXT) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_field() {
        assert_eq!(provider_error_text(r#"{"detail": "No file uploaded"}"#), "No file uploaded");
    }

    #[test]
    fn test_error_string_field() {
        let body = r#"{"error": "No text could be extracted from the file", "text": "", "analysis": "Unable to analyze - no text found"}"#;
        assert_eq!(provider_error_text(body), "No text could be extracted from the file");
    }

    #[test]
    fn test_nested_error_message() {
        let body = r#"{"error": {"code": 400, "message": "API key not valid", "status": "INVALID_ARGUMENT"}}"#;
        assert_eq!(provider_error_text(body), "API key not valid");
    }

    #[test]
    fn test_plain_body() {
        assert_eq!(provider_error_text("Internal Server Error\n"), "Internal Server Error");
        assert_eq!(provider_error_text("  "), "empty response body");
    }

    #[test]
    fn test_long_body_is_shortened() {
        let body = "é".repeat(2000);
        let text = provider_error_text(&body);
        assert!(text.ends_with("..."));
        assert_eq!(text.chars().count(), MAX_ERROR_TEXT + 3);
    }
}

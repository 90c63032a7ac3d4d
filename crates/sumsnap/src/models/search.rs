use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Longest snippet kept from a search hit, in characters.
pub const MAX_SNIPPET_CHARS: usize = 500;

const UNTITLED: &str = "(untitled)";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

impl SearchResult {
    /// Normalize one result object from the search provider.
    ///
    /// Providers disagree on the field carrying the excerpt, so `content` is
    /// preferred and `snippet` used otherwise.
    pub fn from_provider(value: &Value) -> Self {
        let title = value
            .get("title")
            .and_then(Value::as_str)
            .filter(|title| !title.is_empty())
            .unwrap_or(UNTITLED);
        let url = value.get("url").and_then(Value::as_str).unwrap_or_default();
        let snippet = value
            .get("content")
            .and_then(Value::as_str)
            .or_else(|| value.get("snippet").and_then(Value::as_str))
            .unwrap_or_default();

        SearchResult {
            title: title.to_string(),
            url: url.to_string(),
            snippet: truncate_chars(snippet, MAX_SNIPPET_CHARS),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    pub results: Vec<SearchResult>,
}

impl SearchResponse {
    /// Build a response from the provider's raw JSON body.
    pub fn from_provider(body: &Value) -> Self {
        let results = body
            .get("results")
            .and_then(Value::as_array)
            .map(|items| items.iter().map(SearchResult::from_provider).collect())
            .unwrap_or_default();
        let answer = body
            .get("answer")
            .and_then(Value::as_str)
            .filter(|answer| !answer.is_empty())
            .map(String::from);

        SearchResponse { answer, results }
    }
}

/// Truncate to at most `max` characters without splitting a code point.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_prefers_content_over_snippet() {
        let result = SearchResult::from_provider(&json!({
            "title": "Rust 1.80",
            "url": "https://blog.rust-lang.org",
            "content": "from content",
            "snippet": "from snippet"
        }));
        assert_eq!(result.snippet, "from content");
    }

    #[test]
    fn test_falls_back_to_snippet_and_defaults() {
        let result = SearchResult::from_provider(&json!({ "snippet": "only snippet" }));
        assert_eq!(result.title, "(untitled)");
        assert_eq!(result.url, "");
        assert_eq!(result.snippet, "only snippet");
    }

    #[test]
    fn test_snippet_is_bounded() {
        let long = "가".repeat(MAX_SNIPPET_CHARS + 20);
        let result = SearchResult::from_provider(&json!({ "content": long }));
        assert_eq!(result.snippet.chars().count(), MAX_SNIPPET_CHARS);
    }

    #[test]
    fn test_response_without_results_array() {
        let response = SearchResponse::from_provider(&json!({ "results": "nope", "answer": "" }));
        assert!(response.results.is_empty());
        assert_eq!(response.answer, None);
    }

    #[test]
    fn test_truncate_chars_short_input() {
        assert_eq!(truncate_chars("abc", 5), "abc");
        assert_eq!(truncate_chars("abcdef", 3), "abc");
    }
}

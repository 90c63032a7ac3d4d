use serde::Serialize;
use tera::Error as TeraError;

use crate::models::message::{ChatMessage, RelayRequest};
use crate::models::search::{truncate_chars, SearchResult, MAX_SNIPPET_CHARS};
use crate::prompt_template::load_embedded_prompt;

/// Only the first few hits are injected; the rest are dropped.
pub const MAX_CONTEXT_RESULTS: usize = 3;

pub const PRODUCT_NAME: &str = "SumSnap";

#[derive(Serialize)]
struct WebContext<'a> {
    system: Option<&'a str>,
    results: Vec<SearchResult>,
}

#[derive(Serialize)]
struct SystemContext<'a> {
    product: &'a str,
    version: &'a str,
}

/// The product guide instruction used by the chat widget.
pub fn default_system_prompt() -> Result<String, TeraError> {
    let context = SystemContext {
        product: PRODUCT_NAME,
        version: env!("CARGO_PKG_VERSION"),
    };
    Ok(load_embedded_prompt("system.md", &context)?.trim_end().to_string())
}

/// Render the web context block, appended to `system` when there is one.
pub fn web_context_instruction(
    system: Option<&str>,
    results: &[SearchResult],
) -> Result<String, TeraError> {
    let results = results
        .iter()
        .take(MAX_CONTEXT_RESULTS)
        .map(|result| SearchResult {
            title: result.title.clone(),
            url: result.url.clone(),
            snippet: truncate_chars(&result.snippet, MAX_SNIPPET_CHARS),
        })
        .collect();
    let context = WebContext {
        system: system.filter(|s| !s.trim().is_empty()),
        results,
    };
    Ok(load_embedded_prompt("web_context.md", &context)?
        .trim_end()
        .to_string())
}

/// Build the relay payload for one turn.
///
/// History is passed through untouched; only the instruction changes.
pub fn compose(
    history: &[ChatMessage],
    system_prompt: Option<&str>,
    results: &[SearchResult],
) -> Result<RelayRequest, TeraError> {
    let instruction = if results.is_empty() {
        system_prompt.map(String::from)
    } else {
        Some(web_context_instruction(system_prompt, results)?)
    };

    Ok(RelayRequest {
        messages: history.to_vec(),
        system_prompt: instruction,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::role::Role;

    fn result(n: usize, snippet: &str) -> SearchResult {
        SearchResult {
            title: format!("Title {}", n),
            url: format!("https://example.com/{}", n),
            snippet: snippet.to_string(),
        }
    }

    fn history() -> Vec<ChatMessage> {
        vec![
            ChatMessage::user("what is sumsnap?"),
            ChatMessage::assistant("A summarizer."),
            ChatMessage::user("latest AI news"),
        ]
    }

    #[test]
    fn test_passthrough_without_instruction_or_results() {
        let request = compose(&history(), None, &[]).unwrap();
        assert_eq!(request.messages, history());
        assert_eq!(request.system_prompt, None);
    }

    #[test]
    fn test_system_prompt_only() {
        let request = compose(&history(), Some("be brief"), &[]).unwrap();
        assert_eq!(request.system_prompt.as_deref(), Some("be brief"));
        assert_eq!(request.messages, history());
    }

    #[test]
    fn test_two_results_produce_two_entries() {
        let long = "x".repeat(800);
        let results = vec![result(1, &long), result(2, "short")];
        let request = compose(&history(), Some("be brief"), &results).unwrap();
        let instruction = request.system_prompt.unwrap();

        assert!(instruction.starts_with("be brief\n\n[Web search context]\n1. Title 1\n"));
        assert!(instruction.contains("URL: https://example.com/1"));
        assert!(instruction.contains("\n\n2. Title 2\nURL: https://example.com/2\nSummary: short"));
        assert!(!instruction.contains("\n3. "));
        assert!(instruction.contains(&format!("Summary: {}\n", "x".repeat(500))));
        assert!(!instruction.contains(&"x".repeat(501)));
        assert!(instruction.contains("cite the source URLs"));
        assert_eq!(request.messages[2].role, Role::User);
    }

    #[test]
    fn test_results_beyond_three_are_dropped() {
        let results: Vec<_> = (1..=5).map(|n| result(n, "s")).collect();
        let instruction = web_context_instruction(None, &results).unwrap();

        assert!(instruction.starts_with("[Web search context]\n1. Title 1"));
        assert!(instruction.contains("3. Title 3"));
        assert!(!instruction.contains("Title 4"));
    }

    #[test]
    fn test_default_system_prompt_mentions_product() {
        let prompt = default_system_prompt().unwrap();
        assert!(prompt.contains("SumSnap (v"));
        assert!(prompt.contains("Never reveal keys"));
    }
}

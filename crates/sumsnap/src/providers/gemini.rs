use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde_json::{json, Value};

use super::base::{FragmentStream, StreamingProvider, GENERATION_CONFIG};
use super::configs::GeminiProviderConfig;
use super::utils::SseDecoder;
use crate::errors::ProviderError;
use crate::models::message::RelayRequest;
use crate::models::role::Role;

pub struct GeminiProvider {
    client: Client,
    config: GeminiProviderConfig,
}

impl GeminiProvider {
    pub fn new(config: GeminiProviderConfig) -> Result<Self, ProviderError> {
        // No overall timeout: replies are streamed and may legitimately run long.
        let client = Client::builder().build()?;
        Ok(Self { client, config })
    }

    fn url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
            self.config.host.trim_end_matches('/'),
            self.config.model
        )
    }
}

/// Convert a relay request into Gemini `contents`.
///
/// The instruction goes first as a user turn, followed by the history in order.
pub fn request_to_gemini_contents(request: &RelayRequest) -> Vec<Value> {
    let instruction = request
        .instruction()
        .map(|text| json!({ "role": "user", "parts": [{ "text": text }] }));

    instruction
        .into_iter()
        .chain(request.messages.iter().map(|message| {
            let role = match message.role {
                Role::User => "user",
                Role::Assistant => "model",
            };
            json!({ "role": role, "parts": [{ "text": message.content }] })
        }))
        .collect()
}

/// Extract the text carried by one streamed `GenerateContentResponse`.
pub fn gemini_event_text(data: &str) -> Result<Option<String>, ProviderError> {
    let value: Value = serde_json::from_str(data)
        .map_err(|e| ProviderError::Stream(format!("Invalid stream event: {}", e)))?;

    if let Some(error) = value.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown upstream error");
        return Err(ProviderError::Stream(message.to_string()));
    }

    let candidate = value
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|candidates| candidates.first());

    let Some(candidate) = candidate else {
        if let Some(reason) = value
            .pointer("/promptFeedback/blockReason")
            .and_then(Value::as_str)
        {
            return Err(ProviderError::Stream(format!("Prompt blocked: {}", reason)));
        }
        return Ok(None);
    };

    let text: String = candidate
        .pointer("/content/parts")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default();

    Ok(Some(text).filter(|text| !text.is_empty()))
}

#[async_trait]
impl StreamingProvider for GeminiProvider {
    async fn stream(&self, request: &RelayRequest) -> Result<FragmentStream, ProviderError> {
        let payload = json!({
            "contents": request_to_gemini_contents(request),
            "generationConfig": GENERATION_CONFIG,
        });

        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let mut body = response.bytes_stream();
        let fragments: FragmentStream = Box::pin(stream! {
            let mut decoder = SseDecoder::new();
            loop {
                let (events, done) = match body.next().await {
                    Some(Ok(chunk)) => (decoder.feed(&chunk), false),
                    Some(Err(e)) => {
                        yield Err(ProviderError::from(e));
                        return;
                    }
                    None => (decoder.finish().into_iter().collect(), true),
                };
                for event in events {
                    match gemini_event_text(&event) {
                        Ok(Some(text)) => yield Ok(text),
                        Ok(None) => {}
                        Err(e) => {
                            yield Err(e);
                            return;
                        }
                    }
                }
                if done {
                    break;
                }
            }
        });

        Ok(fragments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::message::ChatMessage;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sse_body(fragments: &[&str]) -> String {
        fragments
            .iter()
            .map(|text| {
                let event = json!({
                    "candidates": [{
                        "content": { "role": "model", "parts": [{ "text": text }] }
                    }]
                });
                format!("data: {}\r\n\r\n", event)
            })
            .collect()
    }

    async fn setup_mock_server(template: ResponseTemplate) -> (MockServer, GeminiProvider) {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash:streamGenerateContent"))
            .and(query_param("alt", "sse"))
            .and(header("x-goog-api-key", "test_api_key"))
            .respond_with(template)
            .mount(&mock_server)
            .await;

        let mut config = GeminiProviderConfig::new("test_api_key");
        config.host = mock_server.uri();
        let provider = GeminiProvider::new(config).unwrap();
        (mock_server, provider)
    }

    #[test]
    fn test_contents_put_instruction_first() {
        let request = RelayRequest::new(vec![
            ChatMessage::user("hi"),
            ChatMessage::assistant("hello"),
        ])
        .with_system_prompt("be brief");

        let contents = request_to_gemini_contents(&request);
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[0], json!({"role": "user", "parts": [{"text": "be brief"}]}));
        assert_eq!(contents[1]["role"], "user");
        assert_eq!(contents[2], json!({"role": "model", "parts": [{"text": "hello"}]}));
    }

    #[test]
    fn test_event_text_variants() {
        assert_eq!(
            gemini_event_text(r#"{"candidates":[{"content":{"parts":[{"text":"a"},{"text":"b"}]}}]}"#),
            Ok(Some("ab".to_string()))
        );
        assert_eq!(
            gemini_event_text(r#"{"candidates":[{"finishReason":"STOP"}]}"#),
            Ok(None)
        );
        assert!(matches!(
            gemini_event_text(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#),
            Err(ProviderError::Stream(_))
        ));
        assert!(matches!(
            gemini_event_text(r#"{"error":{"code":500,"message":"internal"}}"#),
            Err(ProviderError::Stream(msg)) if msg == "internal"
        ));
    }

    #[tokio::test]
    async fn test_stream_yields_fragments_in_order() {
        let template = ResponseTemplate::new(200)
            .insert_header("content-type", "text/event-stream")
            .set_body_string(sse_body(&["Hello", ", ", "world"]));
        let (_server, provider) = setup_mock_server(template).await;

        let request = RelayRequest::new(vec![ChatMessage::user("hi")]);
        let stream = provider.stream(&request).await.unwrap();
        let fragments: Vec<_> = stream.collect().await;

        assert_eq!(
            fragments,
            vec![
                Ok("Hello".to_string()),
                Ok(", ".to_string()),
                Ok("world".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn test_payload_carries_generation_config() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "generationConfig": { "maxOutputTokens": 2048 },
                "contents": [{ "role": "user", "parts": [{ "text": "hi" }] }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string(sse_body(&["ok"])))
            .expect(1)
            .mount(&mock_server)
            .await;

        let mut config = GeminiProviderConfig::new("test_api_key");
        config.host = mock_server.uri();
        let provider = GeminiProvider::new(config).unwrap();

        let request = RelayRequest::new(vec![ChatMessage::user("hi")]);
        let fragments: Vec<_> = provider.stream(&request).await.unwrap().collect().await;
        assert_eq!(fragments, vec![Ok("ok".to_string())]);
    }

    #[tokio::test]
    async fn test_http_error_is_reported_before_streaming() {
        let template = ResponseTemplate::new(403).set_body_string("API key invalid");
        let (_server, provider) = setup_mock_server(template).await;

        let request = RelayRequest::new(vec![ChatMessage::user("hi")]);
        let err = provider.stream(&request).await.err().unwrap();
        assert_eq!(
            err,
            ProviderError::Http {
                status: 403,
                body: "API key invalid".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_error_event_ends_stream_with_error() {
        let body = format!(
            "{}data: {}\n\n",
            sse_body(&["partial"]),
            json!({"error": {"message": "overloaded"}})
        );
        let (_server, provider) = setup_mock_server(ResponseTemplate::new(200).set_body_string(body)).await;

        let request = RelayRequest::new(vec![ChatMessage::user("hi")]);
        let fragments: Vec<_> = provider.stream(&request).await.unwrap().collect().await;
        assert_eq!(
            fragments,
            vec![
                Ok("partial".to_string()),
                Err(ProviderError::Stream("overloaded".to_string()))
            ]
        );
    }
}

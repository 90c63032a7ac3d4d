use async_trait::async_trait;
use reqwest::header::{CACHE_CONTROL, PRAGMA};
use reqwest::Client;
use serde_json::{json, Value};
use thiserror::Error;

use crate::models::search::SearchResponse;

pub const TAVILY_HOST: &str = "https://api.tavily.com";
pub const DEFAULT_MAX_RESULTS: u32 = 5;
const MIN_QUERY_CHARS: usize = 2;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SearchError {
    #[error("Query is too short")]
    Empty,

    #[error("Search API key is not configured")]
    Config,

    #[error("Search provider returned {status}")]
    HttpError { status: u16 },

    #[error("Search request failed: {0}")]
    Exception(String),
}

impl SearchError {
    pub fn kind(&self) -> &'static str {
        match self {
            SearchError::Empty => "empty",
            SearchError::Config => "config",
            SearchError::HttpError { .. } => "http_error",
            SearchError::Exception(_) => "exception",
        }
    }
}

/// Anything that can answer a web query for the chat client.
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str) -> Result<SearchResponse, SearchError>;
}

#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub host: String,
    pub api_key: Option<String>,
    pub max_results: u32,
}

impl SearchConfig {
    pub fn new(api_key: Option<String>) -> Self {
        SearchConfig {
            host: TAVILY_HOST.to_string(),
            api_key,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }

    pub fn with_host<S: Into<String>>(mut self, host: S) -> Self {
        self.host = host.into();
        self
    }
}

pub struct SearchClient {
    client: Client,
    config: SearchConfig,
}

impl SearchClient {
    pub fn new(config: SearchConfig) -> Result<Self, SearchError> {
        let client = Client::builder()
            .build()
            .map_err(|e| SearchError::Exception(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn url(&self) -> String {
        format!("{}/search", self.config.host.trim_end_matches('/'))
    }

    /// POST with the key in both the body and a header; deployments differ in
    /// which one they read.
    async fn post(&self, query: &str, api_key: &str) -> Result<Value, String> {
        let payload = json!({
            "query": query,
            "max_results": self.config.max_results,
            "include_answer": true,
            "search_depth": "advanced",
            "api_key": api_key,
        });

        let response = self
            .client
            .post(self.url())
            .header("X-API-Key", api_key)
            .header(CACHE_CONTROL, "no-store")
            .header(PRAGMA, "no-cache")
            .json(&payload)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), body = %body, "search http_error");
            return Err(format!("status {}", status));
        }
        response.json().await.map_err(|e| e.to_string())
    }

    async fn get(&self, query: &str, api_key: &str) -> Result<Value, SearchError> {
        let max_results = self.config.max_results.to_string();
        let response = self
            .client
            .get(self.url())
            .query(&[
                ("q", query),
                ("api_key", api_key),
                ("max_results", max_results.as_str()),
            ])
            .header(CACHE_CONTROL, "no-store")
            .header(PRAGMA, "no-cache")
            .send()
            .await
            .map_err(|e| SearchError::Exception(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), body = %body, "search get_http_error");
            return Err(SearchError::HttpError {
                status: status.as_u16(),
            });
        }
        response
            .json()
            .await
            .map_err(|e| SearchError::Exception(e.to_string()))
    }
}

#[async_trait]
impl WebSearch for SearchClient {
    async fn search(&self, query: &str) -> Result<SearchResponse, SearchError> {
        let query = query.trim();
        if query.chars().count() < MIN_QUERY_CHARS {
            return Err(SearchError::Empty);
        }

        let api_key = match self.config.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => key,
            _ => {
                tracing::error!("search api key is not configured");
                return Err(SearchError::Config);
            }
        };

        tracing::info!(qlen = query.chars().count(), "search start");

        let body = match self.post(query, api_key).await {
            Ok(body) => body,
            Err(reason) => {
                tracing::warn!(%reason, "search POST failed, falling back to GET");
                self.get(query, api_key).await.inspect_err(|e| {
                    if let SearchError::Exception(msg) = e {
                        tracing::error!(error = %msg, "search exception");
                    }
                })?
            }
        };

        let response = SearchResponse::from_provider(&body);
        tracing::info!(num = response.results.len(), "search done");
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn results_body() -> Value {
        json!({
            "answer": "Short answer",
            "results": [
                {"title": "One", "url": "https://one.example", "content": "first"},
                {"title": "Two", "url": "https://two.example", "snippet": "second"}
            ]
        })
    }

    fn client_for(server: &MockServer, api_key: Option<&str>) -> SearchClient {
        let config = SearchConfig::new(api_key.map(String::from)).with_host(server.uri());
        SearchClient::new(config).unwrap()
    }

    #[tokio::test]
    async fn test_short_query_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(results_body()))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server, Some("key"));
        assert_eq!(client.search(" a ").await, Err(SearchError::Empty));
        assert_eq!(client.search("").await, Err(SearchError::Empty));
    }

    #[tokio::test]
    async fn test_missing_key_is_config_error() {
        let server = MockServer::start().await;
        let client = client_for(&server, None);
        assert_eq!(client.search("rust news").await, Err(SearchError::Config));

        let client = client_for(&server, Some("  "));
        assert_eq!(client.search("rust news").await, Err(SearchError::Config));
    }

    #[tokio::test]
    async fn test_post_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(header("X-API-Key", "key"))
            .and(header("Cache-Control", "no-store"))
            .and(body_partial_json(json!({
                "query": "latest AI news",
                "api_key": "key",
                "max_results": 5,
                "include_answer": true
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(results_body()))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, Some("key"));
        let response = client.search("  latest AI news ").await.unwrap();

        assert_eq!(response.answer.as_deref(), Some("Short answer"));
        assert_eq!(response.results.len(), 2);
        assert_eq!(response.results[0].snippet, "first");
        assert_eq!(response.results[1].snippet, "second");
    }

    #[tokio::test]
    async fn test_falls_back_to_get_when_post_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(405))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("q", "rust async"))
            .and(query_param("api_key", "key"))
            .and(query_param("max_results", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(results_body()))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, Some("key"));
        let response = client.search("rust async").await.unwrap();
        assert_eq!(response.results.len(), 2);
    }

    #[tokio::test]
    async fn test_falls_back_to_get_when_post_body_is_not_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("q", "rust async"))
            .respond_with(ResponseTemplate::new(200).set_body_json(results_body()))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, Some("key"));
        let response = client.search("rust async").await.unwrap();
        assert_eq!(response.answer.as_deref(), Some("Short answer"));
        assert_eq!(response.results.len(), 2);
        assert_eq!(response.results[0].snippet, "first");
    }

    #[tokio::test]
    async fn test_both_attempts_fail_is_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let client = client_for(&server, Some("key"));
        let err = client.search("rust async").await.unwrap_err();
        assert_eq!(err, SearchError::HttpError { status: 401 });
        assert_eq!(err.kind(), "http_error");
    }

    #[tokio::test]
    async fn test_undecodable_fallback_is_exception() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let client = client_for(&server, Some("key"));
        let err = client.search("rust async").await.unwrap_err();
        assert_eq!(err.kind(), "exception");
    }
}

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use sumsnap::{
    conversation::{ByteStream, ChatTransport, TransportError},
    models::{message::RelayRequest, search::SearchResponse},
    search::{SearchError, WebSearch},
    waitlist::WaitlistEntry,
};

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:3000";

/// Talks to a running `sumsnapd`.
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WaitlistReply {
    pub success: bool,
    pub message: String,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Submit the form; the server answers with a reply for every outcome.
    pub async fn join_waitlist(&self, entry: &WaitlistEntry) -> Result<WaitlistReply, reqwest::Error> {
        self.client
            .post(self.url("/api/waitlist"))
            .json(entry)
            .send()
            .await?
            .json::<WaitlistReply>()
            .await
    }
}

#[async_trait]
impl ChatTransport for HttpBackend {
    async fn open(&self, request: &RelayRequest) -> Result<ByteStream, TransportError> {
        let response = self
            .client
            .post(self.url("/api/chat"))
            .json(request)
            .send()
            .await
            .map_err(|e| TransportError::Connection(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| TransportError::Connection(e.to_string())))
            .boxed())
    }
}

#[async_trait]
impl WebSearch for HttpBackend {
    async fn search(&self, query: &str) -> Result<SearchResponse, SearchError> {
        let response = self
            .client
            .post(self.url("/api/search"))
            .json(&json!({ "query": query }))
            .send()
            .await
            .map_err(|e| SearchError::Exception(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<SearchResponse>()
                .await
                .map_err(|e| SearchError::Exception(e.to_string()));
        }

        let kind = response
            .json::<Value>()
            .await
            .ok()
            .and_then(|body| body.get("error").and_then(Value::as_str).map(String::from));
        Err(match kind.as_deref() {
            Some("empty") => SearchError::Empty,
            Some("config") => SearchError::Config,
            Some("exception") => SearchError::Exception("search request failed".to_string()),
            _ => SearchError::HttpError {
                status: status.as_u16(),
            },
        })
    }
}

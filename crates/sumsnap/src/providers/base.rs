use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::Serialize;

use crate::errors::ProviderError;
use crate::models::message::RelayRequest;

/// Text deltas in the order the provider produced them.
pub type FragmentStream = BoxStream<'static, Result<String, ProviderError>>;

/// Sampling parameters sent with every completion. Not user configurable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

pub const GENERATION_CONFIG: GenerationConfig = GenerationConfig {
    temperature: 0.7,
    top_p: 0.9,
    max_output_tokens: 2048,
};

/// A model provider that can stream a completion
#[async_trait]
pub trait StreamingProvider: Send + Sync {
    /// Open the upstream request. Fails if the provider rejects it outright;
    /// failures after that arrive as items of the returned stream.
    async fn stream(&self, request: &RelayRequest) -> Result<FragmentStream, ProviderError>;
}

use crate::configuration::Settings;
use std::sync::Arc;
use sumsnap::{
    providers::{base::StreamingProvider, gemini::GeminiProvider},
    relay::Relay,
    search::{SearchClient, WebSearch},
    waitlist::WaitlistClient,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub relay: Relay,
    pub search: Arc<dyn WebSearch>,
    pub waitlist: Arc<WaitlistClient>,
}

impl AppState {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let provider: Option<Arc<dyn StreamingProvider>> =
            match settings.gemini.provider_config() {
                Some(config) => Some(Arc::new(GeminiProvider::new(config)?)),
                None => {
                    tracing::warn!("gemini api key is not set; chat requests will be refused");
                    None
                }
            };
        if settings.search.api_key.is_none() {
            tracing::warn!("search api key is not set; web search is disabled");
        }

        Ok(AppState {
            relay: Relay::new(provider),
            search: Arc::new(SearchClient::new(settings.search.search_config())?),
            waitlist: Arc::new(WaitlistClient::new(settings.notion.waitlist_config())?),
        })
    }
}

use crate::error::{to_env_var, ConfigError};
use config::{Config, Environment};
use serde::Deserialize;
use std::net::SocketAddr;
use sumsnap::{
    providers::configs::{GeminiProviderConfig, GEMINI_HOST, GEMINI_MODEL},
    search::{SearchConfig, DEFAULT_MAX_RESULTS, TAVILY_HOST},
    waitlist::{WaitlistConfig, NOTION_HOST},
};

#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerSettings {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|_| ConfigError::InvalidAddress(format!("{}:{}", self.host, self.port)))
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GeminiSettings {
    pub host: String,
    pub api_key: Option<String>,
    pub model: String,
}

impl Default for GeminiSettings {
    fn default() -> Self {
        GeminiSettings {
            host: GEMINI_HOST.to_string(),
            api_key: None,
            model: GEMINI_MODEL.to_string(),
        }
    }
}

impl GeminiSettings {
    /// `None` when no key is set; the relay then runs unconfigured.
    pub fn provider_config(&self) -> Option<GeminiProviderConfig> {
        let api_key = self.api_key.clone()?;
        Some(GeminiProviderConfig {
            host: self.host.clone(),
            api_key,
            model: self.model.clone(),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub host: String,
    pub api_key: Option<String>,
    pub max_results: u32,
}

impl Default for SearchSettings {
    fn default() -> Self {
        SearchSettings {
            host: TAVILY_HOST.to_string(),
            api_key: None,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }
}

impl SearchSettings {
    pub fn search_config(&self) -> SearchConfig {
        SearchConfig {
            host: self.host.clone(),
            api_key: self.api_key.clone(),
            max_results: self.max_results,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct NotionSettings {
    pub host: String,
    pub api_key: Option<String>,
    pub database_id: Option<String>,
    pub name_property: String,
    pub email_property: String,
}

impl Default for NotionSettings {
    fn default() -> Self {
        NotionSettings {
            host: NOTION_HOST.to_string(),
            api_key: None,
            database_id: None,
            name_property: "Name".to_string(),
            email_property: "Email".to_string(),
        }
    }
}

impl NotionSettings {
    pub fn waitlist_config(&self) -> WaitlistConfig {
        WaitlistConfig {
            host: self.host.clone(),
            api_key: self.api_key.clone(),
            database_id: self.database_id.clone(),
            name_property: self.name_property.clone(),
            email_property: self.email_property.clone(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub gemini: GeminiSettings,
    #[serde(default)]
    pub search: SearchSettings,
    #[serde(default)]
    pub notion: NotionSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let mut settings = Self::load()?;
        settings.apply_fallbacks();
        Ok(settings)
    }

    fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port())?
            .add_source(
                Environment::with_prefix("SUMSNAP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize().map_err(|err| {
            tracing::debug!("Configuration error: {:?}", &err);
            match &err {
                config::ConfigError::Type { key: Some(key), .. } => ConfigError::InvalidEnvVar {
                    env_var: to_env_var(key),
                },
                _ => ConfigError::Other(err),
            }
        })
    }

    /// Fill secrets from the conventional variable names and drop blank ones.
    fn apply_fallbacks(&mut self) {
        resolve_secret(&mut self.gemini.api_key, "GEMINI_API_KEY");
        resolve_secret(&mut self.search.api_key, "TAVILY_API_KEY");
        resolve_secret(&mut self.notion.api_key, "NOTION_API_KEY");
        resolve_secret(&mut self.notion.database_id, "NOTION_DATABASE_ID");
    }
}

fn resolve_secret(slot: &mut Option<String>, fallback: &str) {
    let current = slot.take().filter(|value| !value.trim().is_empty());
    *slot = current.or_else(|| {
        std::env::var(fallback)
            .ok()
            .filter(|value| !value.trim().is_empty())
    });
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

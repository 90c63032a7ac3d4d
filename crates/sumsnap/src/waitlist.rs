use lazy_static::lazy_static;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

pub const NOTION_HOST: &str = "https://api.notion.com";
pub const NOTION_VERSION: &str = "2022-06-28";

pub const SUCCESS_MESSAGE: &str =
    "You're on the waitlist! We'll let you know as soon as SumSnap launches.";

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitlistEntry {
    pub name: String,
    pub email: String,
}

impl WaitlistEntry {
    pub fn new<S: Into<String>, T: Into<String>>(name: S, email: T) -> Self {
        WaitlistEntry {
            name: name.into(),
            email: email.into(),
        }
    }

    /// Check the form fields; nothing is sent anywhere.
    pub fn validate(&self) -> Result<(), WaitlistError> {
        if self.name.trim().is_empty() || self.email.trim().is_empty() {
            return Err(WaitlistError::MissingFields);
        }
        if !EMAIL_RE.is_match(self.email.trim()) {
            return Err(WaitlistError::InvalidEmail);
        }
        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum WaitlistError {
    #[error("Name and email are required")]
    MissingFields,

    #[error("Email address is malformed")]
    InvalidEmail,

    #[error("Notion credentials are not configured")]
    Unconfigured,

    #[error("Notion returned {status}")]
    Upstream { status: u16 },

    #[error("Notion request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl WaitlistError {
    /// Text shown on the form.
    pub fn user_message(&self) -> &'static str {
        match self {
            WaitlistError::MissingFields => "Please enter both your name and email.",
            WaitlistError::InvalidEmail => "Please enter a valid email address.",
            WaitlistError::Unconfigured => "A server configuration error occurred.",
            WaitlistError::Upstream { .. } | WaitlistError::Transport(_) => {
                "Something went wrong while signing you up. Please try again."
            }
        }
    }

    /// Whether the caller sent bad input, as opposed to a server-side failure.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            WaitlistError::MissingFields | WaitlistError::InvalidEmail
        )
    }
}

#[derive(Debug, Clone)]
pub struct WaitlistConfig {
    pub host: String,
    pub api_key: Option<String>,
    pub database_id: Option<String>,
    pub name_property: String,
    pub email_property: String,
}

impl WaitlistConfig {
    pub fn new(api_key: Option<String>, database_id: Option<String>) -> Self {
        WaitlistConfig {
            host: NOTION_HOST.to_string(),
            api_key,
            database_id,
            name_property: "Name".to_string(),
            email_property: "Email".to_string(),
        }
    }

    fn credentials(&self) -> Option<(&str, &str)> {
        let key = self.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty())?;
        let db = self
            .database_id
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())?;
        Some((key, db))
    }
}

pub struct WaitlistClient {
    client: Client,
    config: WaitlistConfig,
}

impl WaitlistClient {
    pub fn new(config: WaitlistConfig) -> Result<Self, WaitlistError> {
        let client = Client::builder().build()?;
        Ok(Self { client, config })
    }

    fn page_payload(&self, database_id: &str, entry: &WaitlistEntry) -> Value {
        let mut properties = serde_json::Map::new();
        properties.insert(
            self.config.name_property.clone(),
            json!({ "title": [{ "text": { "content": entry.name.trim() } }] }),
        );
        properties.insert(
            self.config.email_property.clone(),
            json!({ "email": entry.email.trim() }),
        );

        json!({
            "parent": { "database_id": database_id },
            "properties": properties,
        })
    }

    /// Record one sign-up. Every successful call creates a new row.
    pub async fn submit(&self, entry: &WaitlistEntry) -> Result<(), WaitlistError> {
        entry.validate()?;

        let Some((api_key, database_id)) = self.config.credentials() else {
            tracing::error!("notion api credentials are not configured");
            return Err(WaitlistError::Unconfigured);
        };

        let url = format!("{}/v1/pages", self.config.host.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .header("Notion-Version", NOTION_VERSION)
            .json(&self.page_payload(database_id, entry))
            .send()
            .await
            .inspect_err(|e| tracing::error!(error = %e, "waitlist submission failed"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), body = %body, "notion api error");
            return Err(WaitlistError::Upstream {
                status: status.as_u16(),
            });
        }

        tracing::info!("waitlist entry recorded");
        Ok(())
    }
}

pub mod chat;
pub mod health;
pub mod search;
pub mod waitlist;

use crate::state::AppState;
use axum::Router;

pub fn configure(state: AppState) -> Router {
    Router::new()
        .merge(chat::routes(state.clone()))
        .merge(search::routes(state.clone()))
        .merge(waitlist::routes(state))
        .merge(health::routes())
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::configuration::Settings;
    use crate::state::AppState;
    use axum::{
        body::Body,
        http::{Request, Response},
    };
    use http_body_util::BodyExt;
    use serde_json::Value;

    /// State whose upstream services all point at `host`.
    pub fn state_for(host: &str, configured: bool) -> AppState {
        let mut settings = Settings::default();
        settings.gemini.host = host.to_string();
        settings.search.host = host.to_string();
        settings.notion.host = host.to_string();
        if configured {
            settings.gemini.api_key = Some("gemini-key".to_string());
            settings.search.api_key = Some("tavily-key".to_string());
            settings.notion.api_key = Some("notion-key".to_string());
            settings.notion.database_id = Some("db-1".to_string());
        }
        AppState::from_settings(&settings).unwrap()
    }

    pub fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .method("POST")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    pub async fn json_body(response: Response<Body>) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }
}

use crate::{error::ApiError, state::AppState};
use axum::{extract::State, response::Json, routing::post, Router};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::{json, Value};
use sumsnap::waitlist::{WaitlistEntry, SUCCESS_MESSAGE};

#[derive(Debug, Default, Deserialize)]
struct WaitlistForm {
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
}

async fn handler(State(state): State<AppState>, body: Bytes) -> Result<Json<Value>, ApiError> {
    let form: WaitlistForm = serde_json::from_slice(&body).unwrap_or_default();
    let entry = WaitlistEntry::new(form.name, form.email);

    state.waitlist.submit(&entry).await?;
    Ok(Json(json!({ "success": true, "message": SUCCESS_MESSAGE })))
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/waitlist", post(handler))
        .with_state(state)
}

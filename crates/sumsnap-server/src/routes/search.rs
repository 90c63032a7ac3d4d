use crate::{error::ApiError, state::AppState};
use axum::{extract::State, response::Json, routing::post, Router};
use bytes::Bytes;
use serde::Deserialize;
use sumsnap::models::search::SearchResponse;

#[derive(Debug, Default, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    query: String,
}

async fn handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<SearchResponse>, ApiError> {
    let request: SearchQuery = serde_json::from_slice(&body).unwrap_or_default();
    let response = state.search.search(&request.query).await?;
    Ok(Json(response))
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/search", post(handler))
        .with_state(state)
}

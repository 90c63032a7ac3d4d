use crate::{error::ApiError, state::AppState};
use axum::{
    body::Body,
    extract::State,
    http::header::{CACHE_CONTROL, CONTENT_TYPE},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use bytes::Bytes;
use serde_json::Value;
use sumsnap::relay::StreamSession;

/// Relay one chat turn and stream the reply back as plain text.
///
/// The session is cancelled when axum drops the body, which is how a client
/// disconnect reaches the upstream request.
async fn handler(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let payload = serde_json::from_slice::<Value>(&body).unwrap_or_else(|e| {
        tracing::debug!(error = %e, "chat body is not json");
        Value::Null
    });

    let session = StreamSession::new();
    let stream = state.relay.open(payload, session).await?;

    Ok((
        [
            (CONTENT_TYPE, "text/plain; charset=utf-8"),
            (CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(stream),
    )
        .into_response())
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(handler))
        .with_state(state)
}

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use sumsnap::{errors::RelayError, search::SearchError, waitlist::WaitlistError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {env_var}")]
    InvalidEnvVar { env_var: String },

    #[error("Invalid server address: {0}")]
    InvalidAddress(String),

    #[error("Configuration error: {0}")]
    Other(#[from] config::ConfigError),
}

/// Environment variable that sets the dotted configuration key `field`.
pub fn to_env_var(field: &str) -> String {
    format!("SUMSNAP_{}", field.replace('.', "__").to_uppercase())
}

/// JSON error body with its status code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: Value,
}

impl ApiError {
    #[cfg(test)]
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<RelayError> for ApiError {
    fn from(err: RelayError) -> Self {
        let (status, kind, message) = match &err {
            RelayError::BadRequest(reason) => {
                (StatusCode::BAD_REQUEST, err.kind(), reason.clone())
            }
            RelayError::Unconfigured => (
                StatusCode::INTERNAL_SERVER_ERROR,
                err.kind(),
                "The server is not configured to reach the language model.".to_string(),
            ),
            RelayError::UpstreamHttp { .. }
            | RelayError::UpstreamException(_)
            | RelayError::Stream(_) => (
                StatusCode::BAD_GATEWAY,
                err.kind(),
                "The language model service failed. Please try again.".to_string(),
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal",
                "Internal server error.".to_string(),
            ),
        };
        ApiError {
            status,
            body: json!({ "error": kind, "message": message }),
        }
    }
}

impl From<SearchError> for ApiError {
    fn from(err: SearchError) -> Self {
        let status = match err {
            SearchError::Empty => StatusCode::BAD_REQUEST,
            SearchError::Config => StatusCode::INTERNAL_SERVER_ERROR,
            SearchError::HttpError { .. } | SearchError::Exception(_) => StatusCode::BAD_GATEWAY,
        };
        ApiError {
            status,
            body: json!({ "error": err.kind() }),
        }
    }
}

impl From<WaitlistError> for ApiError {
    fn from(err: WaitlistError) -> Self {
        let status = match err {
            WaitlistError::MissingFields | WaitlistError::InvalidEmail => StatusCode::BAD_REQUEST,
            WaitlistError::Unconfigured => StatusCode::INTERNAL_SERVER_ERROR,
            WaitlistError::Upstream { .. } | WaitlistError::Transport(_) => StatusCode::BAD_GATEWAY,
        };
        ApiError {
            status,
            body: json!({ "success": false, "message": err.user_message() }),
        }
    }
}

use thiserror::Error;

/// Failures surfaced by the chat relay.
///
/// Everything except [`RelayError::Stream`] is detected before the first byte
/// is forwarded and can still be reported with a status code.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RelayError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Server not configured")]
    Unconfigured,

    #[error("Upstream returned {status}")]
    UpstreamHttp { status: u16 },

    #[error("Upstream request failed: {0}")]
    UpstreamException(String),

    #[error("Stream failed: {0}")]
    Stream(String),
}

impl RelayError {
    /// Stable name used in JSON error payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            RelayError::BadRequest(_) => "bad_request",
            RelayError::Unconfigured => "unconfigured",
            RelayError::UpstreamHttp { .. } => "upstream_http_error",
            RelayError::UpstreamException(_) => "upstream_exception",
            RelayError::Stream(_) => "stream_error",
        }
    }
}

/// Errors raised by a completion provider.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("Provider returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Stream error: {0}")]
    Stream(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        ProviderError::Transport(err.to_string())
    }
}

impl From<ProviderError> for RelayError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Http { status, .. } => RelayError::UpstreamHttp { status },
            ProviderError::Transport(msg) => RelayError::UpstreamException(msg),
            ProviderError::Stream(msg) => RelayError::Stream(msg),
        }
    }
}

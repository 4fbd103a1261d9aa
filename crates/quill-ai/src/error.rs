use std::sync::Arc;

use thiserror::Error;

/// Failure modes of the chat and vectorization capabilities.
///
/// Infrastructure failures (HTTP, timeouts, cancellation, bad config) are
/// reported through this type. Model *output* irregularities are not: a
/// reply that fails to follow the expected grammar degrades to an empty
/// suggestion instead of an error.
#[derive(Clone, Debug, Error)]
pub enum AiError {
    #[error("http error: {0}")]
    Http(#[source] Arc<reqwest::Error>),
    #[error("json error: {0}")]
    Json(#[source] Arc<serde_json::Error>),
    #[error("url error: {0}")]
    Url(#[from] url::ParseError),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("request timed out")]
    Timeout,
    #[error("request cancelled")]
    Cancelled,
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl From<reqwest::Error> for AiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Http(Arc::new(err))
        }
    }
}

impl From<serde_json::Error> for AiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(Arc::new(err))
    }
}

//! Backend call errors.

use axum::http::StatusCode;
use thiserror::Error;

use crate::template::PlaceholderError;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("backend {backend} responded with {status}")]
    UpstreamStatus { backend: String, status: StatusCode },

    #[error("backend request failed: {0}")]
    Transport(#[from] hyper_util::client::legacy::Error),

    #[error("failed to read backend response: {0}")]
    Body(#[from] axum::Error),

    #[error("failed to decode backend response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Placeholder(#[from] PlaceholderError),

    #[error("invalid backend url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("failed to build backend request: {0}")]
    Request(#[from] axum::http::Error),

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("internal error")]
    Internal,
}

impl ProxyError {
    /// HTTP status carried by the error itself, if any.
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            ProxyError::UpstreamStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

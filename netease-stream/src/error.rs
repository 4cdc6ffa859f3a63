//! Error types for the streaming server.
//!
//! Every failure maps to an HTTP status before any media byte is sent.

use std::time::Duration;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use netease_api::NeteaseError;
use netease_cache::CacheError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StreamError {
    /// Malformed local request (missing id, unknown quality).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The vendor API refused or failed to hand out a media URL.
    #[error("cannot resolve media url: {0}")]
    Upstream(#[from] NeteaseError),

    /// The media host answered with an HTTP error status.
    #[error("media host refused request: HTTP {status}")]
    Denied { status: u16 },

    /// The media host answered 2xx with an empty body.
    #[error("media host returned an empty body")]
    EmptyBody,

    /// Network failure while downloading media bytes.
    #[error("media download failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The whole upstream fetch exceeded its deadline.
    #[error("upstream fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Outcome of a shared fetch, as seen by every request waiting on it.
    #[error("fetch failed: {0}")]
    Fetch(FetchFailure),
}

impl StreamError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Upstream(_) | Self::Denied { .. } | Self::EmptyBody | Self::Transport(_) => {
                StatusCode::BAD_GATEWAY
            }
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::Cache(_) | Self::Io(_) | Self::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Fetch(failure) => failure.status,
        }
    }
}

impl IntoResponse for StreamError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "code": status.as_u16(),
            "error": self.to_string(),
        }));
        (status, body).into_response()
    }
}

/// Cloneable summary of a failed upstream fetch, shared with all waiters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct FetchFailure {
    pub status: StatusCode,
    pub message: String,
}

impl FetchFailure {
    /// The fetch task ended without reporting (panicked or was aborted).
    pub fn abandoned() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "upstream fetch was abandoned".into(),
        }
    }
}

impl From<&StreamError> for FetchFailure {
    fn from(err: &StreamError) -> Self {
        match err {
            StreamError::Fetch(inner) => inner.clone(),
            other => Self {
                status: other.status_code(),
                message: other.to_string(),
            },
        }
    }
}

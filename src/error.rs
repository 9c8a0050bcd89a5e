//! Error types shared by the cache, the mutation client and the routes.

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use thiserror::Error;

// ---

/// Failure talking to the tankage backend.
///
/// Cloneable so one outcome can be handed to every caller that shared a
/// de-duplicated request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Connection refused, timeout, reset.
    #[error("network error: {0}")]
    Network(String),

    /// Backend answered with a non-success status.
    #[error("backend returned {status}: {message}")]
    Upstream { status: u16, message: String },

    /// Response body was not the JSON we expected.
    #[error("invalid response body: {0}")]
    Decode(String),
}

impl FetchError {
    // ---
    /// Network errors and 5xx responses are worth retrying; 4xx and decode
    /// errors will fail the same way again.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Network(_) => true,
            FetchError::Upstream { status, .. } => *status >= 500,
            FetchError::Decode(_) => false,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        // ---
        if e.is_decode() {
            FetchError::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            FetchError::Upstream {
                status: status.as_u16(),
                message: e.to_string(),
            }
        } else {
            FetchError::Network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(e: serde_json::Error) -> Self {
        FetchError::Decode(e.to_string())
    }
}

/// Errors surfaced by the dashboard HTTP routes.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("unknown collection '{0}'")]
    UnknownCollection(String),

    #[error("collection '{0}' is read-only")]
    ReadOnly(String),

    #[error(transparent)]
    Upstream(#[from] FetchError),
}

/// Error body, mirroring the backend's `{ message }` shape.
#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        // ---
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::UnknownCollection(_) => StatusCode::NOT_FOUND,
            ApiError::ReadOnly(_) => StatusCode::METHOD_NOT_ALLOWED,
            // Backend rejections keep their client-error status so the UI can
            // show the backend's message; everything else is a gateway failure.
            ApiError::Upstream(FetchError::Upstream { status, .. })
                if (400..500).contains(status) =>
            {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
        };
        if status.is_server_error() {
            tracing::error!("{}", self);
        } else {
            tracing::debug!("{}", self);
        }
        let message = match self {
            ApiError::Upstream(FetchError::Upstream { message, .. }) => message,
            other => other.to_string(),
        };
        (status, Json(ErrorBody { message })).into_response()
    }
}

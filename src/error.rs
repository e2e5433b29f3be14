//! HTTP-facing error type.
//!
//! Handlers return `Result<T, ApiError>`; the response body is
//! `{"detail": "..."}`. Internal failures are logged in full and reported to
//! the caller with a generic message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::services::archive::PersistenceError;
use crate::services::registry::RegistryError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unsupported media type: {0}")]
    UnsupportedMedia(String),

    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<RegistryError> for ApiError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::NotFound(id) => ApiError::NotFound(format!("job {id} not found")),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<garde::Report> for ApiError {
    fn from(report: garde::Report) -> Self {
        ApiError::BadRequest(report.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self {
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
            ApiError::UnsupportedMedia(m) => (StatusCode::UNSUPPORTED_MEDIA_TYPE, m.clone()),
            ApiError::Persistence(e) => {
                tracing::error!(error = %e, "Persistence backend error");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "analysis history is temporarily unavailable".to_string(),
                )
            }
            ApiError::Internal(m) => {
                tracing::error!(message = %m, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

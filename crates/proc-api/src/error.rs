//! HTTP status-code mapping of spec.md §6.1: `400` invalid input, `404`
//! missing entity, `409` illegal transition, `500` internal error.
//! `JOB_LIFECYCLE_ERROR` (spec.md §7) is always surfaced as `409` and never
//! mutates state.

use crate::envelope::{Envelope, ErrorBody};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use proc_engine::JobManagerError;
use proc_storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Internal(String),
}

impl From<JobManagerError> for ApiError {
    fn from(error: JobManagerError) -> Self {
        match error {
            JobManagerError::NotFound(id) => ApiError::NotFound(format!("job {id} not found")),
            JobManagerError::Lifecycle(message) => ApiError::Conflict(message),
            JobManagerError::Storage(error) => ApiError::Internal(error.to_string()),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(error: StorageError) -> Self {
        ApiError::Internal(error.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", message),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, "NOT_FOUND", message),
            ApiError::Conflict(message) => (StatusCode::CONFLICT, "JOB_LIFECYCLE_ERROR", message),
            ApiError::Internal(message) => {
                tracing::error!(%message, "internal error serving request");
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
            }
        };
        let body: Envelope<()> = Envelope {
            success: false,
            data: None,
            error: Some(ErrorBody {
                code: code.to_string(),
                message,
            }),
            timestamp: Utc::now().to_rfc3339(),
        };
        (status, Json(body)).into_response()
    }
}

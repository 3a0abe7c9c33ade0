//! HTTP error type and JSON error payload.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::domains::distribution::{CoordinatorError, PublishJobError};

#[derive(Debug, Clone, Serialize)]
pub struct ErrorDetail {
    pub kind: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    /// A cycle or force-publish is already running
    #[error("{0}")]
    Busy(String),

    #[error("{0}")]
    ServiceUnavailable(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            Self::Busy(_) => (StatusCode::CONFLICT, "busy"),
            Self::ServiceUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status_and_kind();
        if status.is_server_error() {
            tracing::error!(kind, error = %self, "Request failed");
        }
        let body = ErrorResponse {
            error: ErrorDetail {
                kind,
                message: self.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}

/// Store failures surface as 503 so callers know to retry.
impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        Self::ServiceUnavailable(format!("{:#}", e))
    }
}

impl From<PublishJobError> for ApiError {
    fn from(e: PublishJobError) -> Self {
        match e {
            PublishJobError::NotFound(_) => Self::NotFound(e.to_string()),
            PublishJobError::Unpublished(_) | PublishJobError::Invalid(_) => {
                Self::BadRequest(e.to_string())
            }
            PublishJobError::Source(_) => Self::ServiceUnavailable(e.to_string()),
        }
    }
}

impl From<CoordinatorError> for ApiError {
    fn from(e: CoordinatorError) -> Self {
        match e {
            CoordinatorError::Busy => Self::Busy(e.to_string()),
            CoordinatorError::Publish(inner) => inner.into(),
            CoordinatorError::Aborted(_) => Self::Internal(e.to_string()),
        }
    }
}

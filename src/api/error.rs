//! API error types with structured JSON responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::chat::ChatError;
use crate::core_state::CoreError;
use crate::pipeline::detection::DetectionError;

/// Structured error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Authentication required")]
    Unauthorized,
    #[error("A detection is already running for this session")]
    DetectionInProgress,
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),
    #[error("Unprocessable image: {0}")]
    UnprocessableImage(String),
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("Record could not be saved: {0}")]
    RecordPersist(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::BadRequest(detail) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", detail.clone())
            }
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "AUTH_REQUIRED",
                "Authentication required".to_string(),
            ),
            ApiError::DetectionInProgress => (
                StatusCode::CONFLICT,
                "DETECTION_IN_PROGRESS",
                "A detection is already running for this session".to_string(),
            ),
            ApiError::PayloadTooLarge(detail) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "PAYLOAD_TOO_LARGE",
                detail.clone(),
            ),
            ApiError::UnprocessableImage(detail) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "UNPROCESSABLE_IMAGE",
                detail.clone(),
            ),
            ApiError::ServiceUnavailable(detail) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
                detail.clone(),
            ),
            ApiError::RecordPersist(detail) => {
                tracing::error!(detail = %detail, "Detection record write failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "RECORD_PERSIST_FAILED",
                    detail.clone(),
                )
            }
            ApiError::Internal(detail) => {
                tracing::error!(detail = %detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ErrorBody {
            error: ErrorDetail { code, message },
        };
        (status, Json(body)).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::DetectionInProgress => ApiError::DetectionInProgress,
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<DetectionError> for ApiError {
    fn from(err: DetectionError) -> Self {
        match err {
            DetectionError::ImageDecode(detail) => ApiError::UnprocessableImage(detail),
            DetectionError::RecordPersist(detail) => ApiError::RecordPersist(detail),
            DetectionError::Cancelled => ApiError::BadRequest("Detection cancelled".into()),
            DetectionError::Internal(detail) => ApiError::Internal(detail),
        }
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::NotConfigured => {
                ApiError::ServiceUnavailable("Chat assistant is not configured".into())
            }
            ChatError::EmptyMessage | ChatError::MessageTooLong => {
                ApiError::BadRequest(err.to_string())
            }
            ChatError::Generation(e) => {
                tracing::warn!(error = %e, "Chat generation failed");
                ApiError::ServiceUnavailable("Chat assistant did not respond".into())
            }
        }
    }
}

impl From<crate::db::DatabaseError> for ApiError {
    fn from(err: crate::db::DatabaseError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

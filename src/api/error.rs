use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::IntoResponse,
};
use thiserror::Error;

use super::models::ErrorResponse;
use super::validation::RequestValidationError;
use crate::error::MediaError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("payload invalid: {0}")]
    InvalidPayload(String),
    #[error("{0}")]
    Acquisition(String),
    #[error("{0}")]
    ToolMissing(String),
    #[error("{0}")]
    NotFound(String),
    #[error("file not ready or missing")]
    NotReady,
    #[error("{0}")]
    Timeout(String),
    #[error("{0}")]
    QueueFull(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidPayload(_)
            | ApiError::Acquisition(_)
            | ApiError::ToolMissing(_)
            | ApiError::NotReady => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::QueueFull(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidPayload(_) => "INVALID_PAYLOAD",
            ApiError::Acquisition(_) => "ACQUISITION_FAILED",
            ApiError::ToolMissing(_) => "TOOL_MISSING",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::NotReady => "NOT_READY",
            ApiError::Timeout(_) => "TIMEOUT",
            ApiError::QueueFull(_) => "QUEUE_FULL",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "Request failed");
        }
        let body = ErrorResponse {
            code: self.code(),
            message: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<MediaError> for ApiError {
    fn from(err: MediaError) -> Self {
        let message = err.to_string();
        match err {
            MediaError::Validation(_) => ApiError::InvalidPayload(message),
            MediaError::MetadataFetch(_) | MediaError::Download(_) => {
                ApiError::Acquisition(message)
            }
            MediaError::ToolMissing(_) => ApiError::ToolMissing(message),
            MediaError::Timeout(_) => ApiError::Timeout(message),
            MediaError::NotFound(_) => ApiError::NotFound(message),
            MediaError::NotReady => ApiError::NotReady,
            MediaError::QueueFull(_) => ApiError::QueueFull(message),
            MediaError::ArtifactMissing(_) | MediaError::Io(_) => ApiError::Internal(message),
        }
    }
}

impl From<RequestValidationError> for ApiError {
    fn from(err: RequestValidationError) -> Self {
        ApiError::InvalidPayload(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidPayload(rejection.body_text())
    }
}

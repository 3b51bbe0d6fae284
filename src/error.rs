/// Unified error types for the VidStream account backend
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the service
#[derive(Error, Debug)]
pub enum ApiError {
    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Validation errors (missing or malformed input)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Handle or email collision on registration
    #[error("Conflict: {0}")]
    Duplicate(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Password mismatch on login or password change
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Refresh token missing, malformed, expired, or rotated out.
    /// All refresh failures collapse to this one kind so a caller holding
    /// a stale token learns nothing about rotation state.
    #[error("Invalid or expired token")]
    InvalidToken,

    /// Access token missing or unresolvable to a live account
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Media upload or other external dependency failure
    #[error("Upstream failure: {0}")]
    Upstream(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Uniform error response envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Convert ApiError to HTTP response
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::Validation(_) => (
                StatusCode::BAD_REQUEST,
                "ValidationFailed",
                self.to_string(),
            ),
            ApiError::Duplicate(_) => (
                StatusCode::CONFLICT,
                "Duplicate",
                self.to_string(),
            ),
            ApiError::NotFound(_) => (
                StatusCode::NOT_FOUND,
                "NotFound",
                self.to_string(),
            ),
            ApiError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "InvalidCredentials",
                self.to_string(),
            ),
            ApiError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                "InvalidToken",
                self.to_string(),
            ),
            ApiError::Unauthorized(_) => (
                StatusCode::UNAUTHORIZED,
                "Unauthorized",
                self.to_string(),
            ),
            ApiError::Upstream(_) => (
                StatusCode::BAD_GATEWAY,
                "UpstreamFailure",
                self.to_string(),
            ),
            ApiError::Database(_) | ApiError::Io(_) | ApiError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "InternalServerError",
                "Internal server error".to_string(), // Don't leak details
            ),
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for service operations
pub type ApiResult<T> = Result<T, ApiError>;

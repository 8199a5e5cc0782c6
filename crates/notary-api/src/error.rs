//! API error types with proper HTTP mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use notary_anchor::AnchorError;
use notary_persist::StorageError;
use serde::Serialize;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Comprehensive API error type
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Chain not configured: {0}")]
    ChainNotConfigured(String),

    #[error("Anchor submission failed: {0}")]
    AnchorSubmission(String),

    #[error("Verification query failed: {0}")]
    VerificationQuery(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Error response body
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            ApiError::ChainNotConfigured(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "CHAIN_NOT_CONFIGURED",
                msg.clone(),
            ),
            ApiError::AnchorSubmission(msg) => (
                StatusCode::BAD_GATEWAY,
                "ANCHOR_SUBMISSION_FAILED",
                msg.clone(),
            ),
            ApiError::VerificationQuery(msg) => (
                StatusCode::BAD_GATEWAY,
                "VERIFICATION_QUERY_FAILED",
                msg.clone(),
            ),
            ApiError::Upstream(msg) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", msg.clone()),
            ApiError::Internal(msg) => {
                // Don't expose internal errors to clients
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
            ApiError::Timeout(msg) => (StatusCode::GATEWAY_TIMEOUT, "TIMEOUT", msg.clone()),
            ApiError::Validation(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "VALIDATION_ERROR",
                msg.clone(),
            ),
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<AnchorError> for ApiError {
    fn from(e: AnchorError) -> Self {
        match e {
            AnchorError::Configuration(msg) => ApiError::ChainNotConfigured(msg),
            AnchorError::Submission(msg) => ApiError::AnchorSubmission(msg),
            e @ AnchorError::ConfirmationTimeout { .. } => ApiError::Timeout(e.to_string()),
            AnchorError::VerificationQuery(msg) => ApiError::VerificationQuery(msg),
            AnchorError::Proof(msg) => ApiError::BadRequest(msg),
            AnchorError::Network(msg) => ApiError::Upstream(msg),
            AnchorError::Serialization(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(msg) => ApiError::NotFound(msg),
            StorageError::AlreadyExists(msg) | StorageError::Conflict(msg) => {
                ApiError::Conflict(msg)
            }
            StorageError::InvalidCredentials => {
                ApiError::Unauthorized("Invalid username or password".to_string())
            }
            _ => ApiError::Internal(e.to_string()),
        }
    }
}

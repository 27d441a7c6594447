//! Error handling for the order engine
//!
//! Every command either commits in full or fails with one of these errors;
//! no variant implies a partially applied ledger update.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    // Validation errors
    #[error("Validation error: {message}")]
    Validation { field: String, message: String },

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Business rule errors
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("Payment proof required: {0}")]
    ProofRequired(String),

    #[error("Payment proof mismatch: {0}")]
    ProofMismatch(String),

    #[error("Concurrent modification: {0}")]
    ConcurrencyConflict(String),

    // Infrastructure errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Shorthand for a field-level validation failure
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Stable machine-readable code for the error
    pub fn code(&self) -> &'static str {
        match self {
            AppError::TokenExpired => "TOKEN_EXPIRED",
            AppError::InvalidToken => "INVALID_TOKEN",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::Validation { .. } => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::InvalidStateTransition(_) => "INVALID_STATE_TRANSITION",
            AppError::PreconditionFailed(_) => "PRECONDITION_FAILED",
            AppError::ProofRequired(_) => "PROOF_REQUIRED",
            AppError::ProofMismatch(_) => "PROOF_MISMATCH",
            AppError::ConcurrencyConflict(_) => "CONCURRENCY_CONFLICT",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the caller may retry the whole command unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::ConcurrencyConflict(_))
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::TokenExpired | AppError::InvalidToken | AppError::Unauthorized(_) => {
                StatusCode::UNAUTHORIZED
            }
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidStateTransition(_)
            | AppError::PreconditionFailed(_)
            | AppError::ProofRequired(_)
            | AppError::ProofMismatch(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::ConcurrencyConflict(_) => StatusCode::CONFLICT,
            AppError::DatabaseError(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let (message, field) = match &self {
            AppError::TokenExpired => ("Token has expired".to_string(), None),
            AppError::InvalidToken => ("Invalid token".to_string(), None),
            AppError::Unauthorized(msg) | AppError::Forbidden(msg) => (msg.clone(), None),
            AppError::Validation { field, message } => (message.clone(), Some(field.clone())),
            AppError::NotFound(resource) => (format!("{} not found", resource), None),
            AppError::InvalidStateTransition(msg)
            | AppError::PreconditionFailed(msg)
            | AppError::ProofRequired(msg)
            | AppError::ProofMismatch(msg)
            | AppError::ConcurrencyConflict(msg) => (msg.clone(), None),
            AppError::DatabaseError(_) => ("A database error occurred".to_string(), None),
            AppError::Internal(_) => ("An internal server error occurred".to_string(), None),
        };

        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::debug!(code = self.code(), "Request rejected: {}", self);
        }

        let body = ErrorResponse {
            error: ErrorDetail {
                code: self.code().to_string(),
                message,
                field,
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for services and handlers
pub type AppResult<T> = Result<T, AppError>;

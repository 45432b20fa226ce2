/// Unified error types for the GradAid service
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the service
#[derive(Error, Debug)]
pub enum AppError {
    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration errors
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Missing or invalid identity
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Record exists but belongs to someone else
    #[error("Not authorized: {0}")]
    Authorization(String),

    /// Malformed input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// A non-deleted application already exists for the (user, program) pair
    #[error("You already have an application for this program")]
    DuplicateApplication,

    /// Program is not offered by the requested university
    #[error("Program does not belong to the specified university")]
    ProgramMismatch,

    /// Ledger bound would be exceeded
    #[error("Insufficient credits. You have {available} credits available.")]
    InsufficientCredits { available: i64, requested: i64 },

    /// Language-model upstream failed
    #[error("Failed to generate document: {0}")]
    Generation(String),

    /// Rate limiting errors
    #[error("Rate limit exceeded")]
    RateLimitExceeded { retry_after: std::time::Duration },

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// JSON error body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl AppError {
    /// Stable machine-readable code for the error body
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Authentication(_) => "AuthenticationRequired",
            AppError::Authorization(_) => "Forbidden",
            AppError::Validation(_) => "InvalidRequest",
            AppError::NotFound(_) => "NotFound",
            AppError::DuplicateApplication => "DuplicateApplication",
            AppError::ProgramMismatch => "ProgramMismatch",
            AppError::InsufficientCredits { .. } => "InsufficientCredits",
            AppError::Generation(_) => "GenerationFailed",
            AppError::RateLimitExceeded { .. } => "RateLimitExceeded",
            AppError::Database(_)
            | AppError::Migration(_)
            | AppError::Internal(_)
            | AppError::Io(_) => "InternalServerError",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Authentication(_) => StatusCode::UNAUTHORIZED,
            AppError::Authorization(_) => StatusCode::FORBIDDEN,
            AppError::Validation(_) | AppError::ProgramMismatch => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::DuplicateApplication => StatusCode::CONFLICT,
            AppError::InsufficientCredits { .. } => StatusCode::PAYMENT_REQUIRED,
            AppError::Generation(_) => StatusCode::BAD_GATEWAY,
            AppError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Database(_)
            | AppError::Migration(_)
            | AppError::Internal(_)
            | AppError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Convert AppError to HTTP response
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Database(_) | AppError::Migration(_) | AppError::Internal(_) | AppError::Io(_) => {
                tracing::error!("Request failed: {}", self);
                "Internal server error".to_string() // Don't leak details
            }
            AppError::Generation(_) => "Failed to generate document".to_string(),
            _ => self.to_string(),
        };

        let body = Json(ErrorResponse {
            error: self.code().to_string(),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for service operations
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::DuplicateApplication.status(), StatusCode::CONFLICT);
        assert_eq!(AppError::ProgramMismatch.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::InsufficientCredits { available: 2, requested: 5 }.status(),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(AppError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Authorization("x".into()).status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_insufficient_credits_message() {
        let err = AppError::InsufficientCredits { available: 2, requested: 5 };
        assert_eq!(err.to_string(), "Insufficient credits. You have 2 credits available.");
    }
}

//! Custom error types and handling
//!
//! This module defines the application's error types and implements
//! conversion to HTTP responses for the Axum framework.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Application-wide error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    // Resource errors
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    // Backpressure
    #[error("Judge queue is full, try again later")]
    QueueFull,

    #[error("Judging service is shutting down")]
    Unavailable,

    // Persistence errors
    #[error("Database error: {0}")]
    Database(String),

    // Execution errors
    #[error("Sandbox error: {0}")]
    Sandbox(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

/// Error details in response
#[derive(Debug, Serialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
}

impl AppError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::UnsupportedLanguage(_) => "UNSUPPORTED_LANGUAGE",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::QueueFull => "QUEUE_FULL",
            Self::Unavailable => "SERVICE_UNAVAILABLE",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Sandbox(_) => "SANDBOX_ERROR",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::UnsupportedLanguage(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::QueueFull => StatusCode::TOO_MANY_REQUESTS,
            Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Database(_) | Self::Sandbox(_) | Self::Configuration(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Whether the message may be shown to clients verbatim
    fn is_client_safe(&self) -> bool {
        !self.status_code().is_server_error() || matches!(self, Self::Unavailable)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Log internal errors but don't expose details to clients
        let message = if self.is_client_safe() {
            self.to_string()
        } else {
            tracing::error!(code = self.error_code(), "{}", self);
            "An internal error occurred".to_string()
        };

        let body = ErrorResponse {
            error: ErrorDetails {
                code: self.error_code().to_string(),
                message,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                AppError::Conflict("Resource already exists".to_string())
            }
            _ => AppError::Database(err.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::QueueFull.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            AppError::UnsupportedLanguage("cobol".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Sandbox("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_codes() {
        let cases = [
            (AppError::Validation("x".into()), "VALIDATION_ERROR"),
            (AppError::UnsupportedLanguage("x".into()), "UNSUPPORTED_LANGUAGE"),
            (AppError::NotFound("x".into()), "NOT_FOUND"),
            (AppError::Conflict("x".into()), "CONFLICT"),
            (AppError::QueueFull, "QUEUE_FULL"),
            (AppError::Unavailable, "SERVICE_UNAVAILABLE"),
            (AppError::Database("x".into()), "DATABASE_ERROR"),
            (AppError::Sandbox("x".into()), "SANDBOX_ERROR"),
            (AppError::Configuration("x".into()), "CONFIGURATION_ERROR"),
        ];
        for (error, code) in cases {
            assert_eq!(error.error_code(), code);
        }
        assert_eq!(AppError::Unavailable.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(AppError::Unavailable.is_client_safe());
        assert!(!AppError::Sandbox("x".into()).is_client_safe());
    }

    #[tokio::test]
    async fn test_internal_details_are_not_exposed() {
        let response = AppError::Database("relation \"x\" does not exist".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("DATABASE_ERROR"));
        assert!(!text.contains("relation"));
    }
}

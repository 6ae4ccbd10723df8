//! Error types for Scheduler
//!
//! All errors in the application are converted to `AppError`,
//! which implements `IntoResponse` for proper HTTP error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::data::UserType;

/// Application-wide error type
///
/// Authentication failures (`Unauthorized`) and authorization failures
/// (`Forbidden`) are kept apart so callers can redirect the former and
/// render the latter.
#[derive(Debug, Error)]
pub enum AppError {
    /// Resource not found (404)
    #[error("Resource not found")]
    NotFound,

    /// Authentication required (401)
    #[error("Unable to authenticate: {0}")]
    Unauthorized(String),

    /// Authenticated, but the principal lacks the required tier (403)
    #[error("User with ID {principal:?} is not allowed to access {required} resources")]
    Forbidden {
        principal: String,
        required: UserType,
    },

    /// Validation error (400)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Database error (500)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Session store error (500)
    #[error("Session error: {0}")]
    Session(String),

    /// Identity provider error (502)
    #[error("Identity provider error: {0}")]
    Identity(String),

    /// Mail provider error (502)
    #[error("Mail error: {0}")]
    Mail(String),

    /// Calendar provider error (502)
    #[error("Calendar error: {0}")]
    Calendar(String),

    /// HTTP client error (502)
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Configuration error (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl AppError {
    /// Prefix the error message with `context`, keeping the variant
    ///
    /// Used by multi-step flows so the caller can tell which step failed.
    pub fn context(self, context: &str) -> Self {
        match self {
            AppError::Unauthorized(msg) => AppError::Unauthorized(format!("{context}: {msg}")),
            AppError::Validation(msg) => AppError::Validation(format!("{context}: {msg}")),
            AppError::Session(msg) => AppError::Session(format!("{context}: {msg}")),
            AppError::Identity(msg) => AppError::Identity(format!("{context}: {msg}")),
            AppError::Mail(msg) => AppError::Mail(format!("{context}: {msg}")),
            AppError::Calendar(msg) => AppError::Calendar(format!("{context}: {msg}")),
            AppError::Config(msg) => AppError::Config(format!("{context}: {msg}")),
            AppError::Database(err) => {
                AppError::Internal(anyhow::Error::new(err).context(context.to_string()))
            }
            AppError::Internal(err) => AppError::Internal(err.context(context.to_string())),
            other => other,
        }
    }

    /// Whether this error means "not authenticated"
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, AppError::Unauthorized(_))
    }

    fn parts(&self) -> (StatusCode, String, &'static str) {
        match self {
            AppError::NotFound => (StatusCode::NOT_FOUND, self.to_string(), "not_found"),
            AppError::Unauthorized(_) => {
                (StatusCode::UNAUTHORIZED, self.to_string(), "unauthorized")
            }
            AppError::Forbidden { .. } => (StatusCode::FORBIDDEN, self.to_string(), "forbidden"),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone(), "validation"),
            AppError::Identity(msg) => (StatusCode::BAD_GATEWAY, msg.clone(), "identity"),
            AppError::Mail(msg) => (StatusCode::BAD_GATEWAY, msg.clone(), "mail"),
            AppError::Calendar(msg) => (StatusCode::BAD_GATEWAY, msg.clone(), "calendar"),
            AppError::HttpClient(_) => (StatusCode::BAD_GATEWAY, self.to_string(), "http_client"),
            AppError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error".to_string(),
                "database",
            ),
            AppError::Session(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone(), "session"),
            AppError::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone(), "config"),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
                "internal",
            ),
        }
    }
}

impl IntoResponse for AppError {
    /// Convert error to HTTP response
    ///
    /// Maps each error variant to appropriate HTTP status code
    /// and JSON error body.
    fn into_response(self) -> Response {
        use axum::Json;

        let (status, error_message, error_type) = self.parts();

        if status.is_server_error() {
            tracing::error!(error = %self, error_type, "Request failed");
        } else {
            tracing::debug!(error = %self, error_type, "Request rejected");
        }

        use crate::metrics::ERRORS_TOTAL;
        ERRORS_TOTAL.with_label_values(&[error_type]).inc();

        let body = Json(serde_json::json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

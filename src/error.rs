/// Unified error types for the recipes manager
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

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization of stored columns
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Correlation state unknown, expired or already consumed
    #[error("Unknown or expired login state")]
    StateNotFound,

    /// Identity token failed signature or claim validation
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// Identity token is valid but lacks a required claim
    #[error("Claims error: {0}")]
    Claims(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Authorization errors
    #[error("Not authorized: {0}")]
    Authorization(String),

    /// Account with the same (name, type) already exists
    #[error("Account already exists: {0}")]
    AccountAlreadyExists(String),

    /// No account matches the lookup
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Imported document does not follow the expected layout
    #[error("Malformed recipe document")]
    MalformedRecipe,

    /// Picture download failures
    #[error("Download failed: {0}")]
    Download(String),

    /// Discovery or token exchange with the identity provider failed
    #[error("Identity provider error: {0}")]
    IdentityProvider(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error body returned to HTTP callers
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            AppError::StateNotFound => (
                StatusCode::NOT_FOUND,
                "UnknownState",
                self.to_string(),
            ),
            AppError::InvalidToken(_) | AppError::Claims(_) => (
                StatusCode::UNAUTHORIZED,
                "InvalidToken",
                "Identity token rejected".to_string(),
            ),
            AppError::Authentication(_) => (
                StatusCode::UNAUTHORIZED,
                "AuthenticationRequired",
                self.to_string(),
            ),
            AppError::Authorization(_) => (
                StatusCode::FORBIDDEN,
                "Forbidden",
                self.to_string(),
            ),
            AppError::AccountAlreadyExists(_) => (
                StatusCode::CONFLICT,
                "AccountAlreadyExists",
                self.to_string(),
            ),
            AppError::AccountNotFound(_) => (
                StatusCode::NOT_FOUND,
                "AccountNotFound",
                "Account not found, please sign up first".to_string(),
            ),
            AppError::NotFound(_) => (
                StatusCode::NOT_FOUND,
                "NotFound",
                self.to_string(),
            ),
            AppError::Validation(_) => (
                StatusCode::BAD_REQUEST,
                "InvalidRequest",
                self.to_string(),
            ),
            AppError::MalformedRecipe => (
                StatusCode::BAD_REQUEST,
                "MalformedRecipe",
                self.to_string(),
            ),
            AppError::IdentityProvider(_) => (
                StatusCode::BAD_GATEWAY,
                "IdentityProviderUnavailable",
                "Identity provider request failed".to_string(),
            ),
            AppError::Database(_)
            | AppError::Download(_)
            | AppError::Io(_)
            | AppError::Serialization(_)
            | AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "InternalServerError",
                "Internal server error".to_string(), // Don't leak details
            ),
        };

        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for service operations
pub type AppResult<T> = Result<T, AppError>;

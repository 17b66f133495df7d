//! API error handling module
//!
//! Provides a unified error type for all API endpoints with structured error variants.
//! Component errors (directory, tokens, ceremonies, storage) convert into [`ApiError`],
//! which logs the internal detail and answers with a terse client message.

use axum::{
    extract::{rejection::JsonRejection, FromRequest},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::auth::TokenError;
use crate::db::StorageError;
use crate::directory::DirectoryError;
use crate::webauthn::CeremonyError;

/// API error type with structured variants for different error categories
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad request - client provided invalid input
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Authentication error with specific error code
    #[error("{message}")]
    AuthError { message: String, code: &'static str },

    /// Forbidden - authenticated but lacking privilege
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Not found - requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Conflict - resource already exists
    #[error("Conflict: {0}")]
    Conflict(String),

    /// OAuth2 token endpoint error (RFC 6749 section 5.2)
    #[error("OAuth error {error}: {detail}")]
    OAuth { error: &'static str, detail: String },

    /// Internal server error - unexpected server-side failure
    #[error("Internal error: {0}")]
    Internal(String),

    /// Service unavailable - required service is not configured or available
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl ApiError {
    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// Create an authentication error with a specific error code
    pub fn auth_error(code: &'static str, message: impl Into<String>) -> Self {
        Self::AuthError {
            message: message.into(),
            code,
        }
    }

    /// Create a forbidden error
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a conflict error
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Create an OAuth2 token endpoint error
    pub fn oauth(error: &'static str, detail: impl Into<String>) -> Self {
        Self::OAuth {
            error,
            detail: detail.into(),
        }
    }

    /// Create an internal server error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a service unavailable error
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable(message.into())
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::OAuth { .. } => StatusCode::BAD_REQUEST,
            Self::AuthError { .. } => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Get the error code for programmatic error handling
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "INVALID_INPUT",
            Self::AuthError { code, .. } => *code,
            Self::Forbidden(_) => "FORBIDDEN",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::OAuth { error, .. } => *error,
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }

    /// Get sanitized error message for client response
    fn client_message(&self) -> String {
        match self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            Self::ServiceUnavailable(_) => "Service temporarily unavailable".to_string(),
            Self::AuthError { message, .. } => message.clone(),
            Self::OAuth { error, .. } => error.to_string(),
            _ => self.to_string(),
        }
    }

    /// Get the error category for logging
    fn error_category(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::AuthError { .. } => "auth_error",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::OAuth { .. } => "oauth",
            Self::Internal(_) => "internal",
            Self::ServiceUnavailable(_) => "service_unavailable",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let category = self.error_category();
        let code = self.error_code();
        let internal_message = self.to_string();
        let client_message = self.client_message();

        // Log based on severity, always including internal details
        match &self {
            Self::BadRequest(_) | Self::NotFound(_) | Self::Conflict(_) | Self::OAuth { .. } => {
                tracing::warn!(
                    status = %status,
                    category = category,
                    code = code,
                    error = %internal_message,
                    "Client error"
                );
            }
            Self::AuthError { .. } | Self::Forbidden(_) => {
                tracing::warn!(
                    status = %status,
                    category = category,
                    code = code,
                    error = %internal_message,
                    "Authorization error"
                );
            }
            Self::ServiceUnavailable(_) => {
                tracing::warn!(
                    status = %status,
                    category = category,
                    code = code,
                    error = %internal_message,
                    "Service unavailable"
                );
            }
            Self::Internal(_) => {
                tracing::error!(
                    status = %status,
                    category = category,
                    code = code,
                    error = %internal_message,
                    "Server error"
                );
            }
        }

        let body = match &self {
            // RFC 6749 error body for the token endpoint
            Self::OAuth { error, .. } => serde_json::json!({ "error": error }),
            _ => serde_json::json!({
                "error": client_message,
                "code": code,
            }),
        };

        (status, Json(body)).into_response()
    }
}

/// JSON body extractor whose rejections answer 400 through [`ApiError`]
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(detail = %rejection.body_text(), "JSON body rejected");
        let message = match rejection {
            JsonRejection::MissingJsonContentType(_) => {
                "Expected Content-Type: application/json"
            }
            JsonRejection::JsonSyntaxError(_) => "Request body is not valid JSON",
            JsonRejection::JsonDataError(_) => "Request body has missing or invalid fields",
            _ => "Request body could not be read",
        };
        Self::bad_request(message)
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<DirectoryError> for ApiError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::Validation(msg) => Self::BadRequest(msg),
            DirectoryError::Conflict => Self::conflict("Email already registered"),
            DirectoryError::AuthFailed => {
                Self::auth_error("AUTH_FAILED", "Invalid email or password")
            }
            DirectoryError::NotFound => Self::not_found("Account not found"),
            DirectoryError::Hashing(msg) => Self::Internal(format!("Password hashing: {msg}")),
            DirectoryError::Storage(e) => e.into(),
        }
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::InvalidClient => Self::oauth("invalid_client", "Unknown client"),
            TokenError::Invalid => Self::auth_error("AUTH_INVALID_TOKEN", "Invalid access token"),
            TokenError::Expired => Self::auth_error("AUTH_TOKEN_EXPIRED", "Access token expired"),
        }
    }
}

impl From<CeremonyError> for ApiError {
    fn from(err: CeremonyError) -> Self {
        match err {
            CeremonyError::SessionNotFound => Self::bad_request("Unknown registration session"),
            CeremonyError::SessionExpired => Self::bad_request("Registration session expired"),
            CeremonyError::AccountMismatch => {
                Self::bad_request("Registration session belongs to another account")
            }
            CeremonyError::ChallengeMismatch => Self::bad_request("Challenge mismatch"),
            CeremonyError::OriginMismatch => Self::bad_request("Origin not allowed"),
            CeremonyError::ResponseDecode(msg) => {
                Self::BadRequest(format!("Malformed authenticator response: {msg}"))
            }
            CeremonyError::Rejected(msg) => {
                Self::BadRequest(format!("Attestation rejected: {msg}"))
            }
            CeremonyError::Engine(msg) => Self::Internal(format!("Ceremony engine: {msg}")),
            CeremonyError::Storage(e) => e.into(),
        }
    }
}

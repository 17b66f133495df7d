//! Bearer token authentication module
//!
//! Provides the `Principal` and `AdminPrincipal` extractors for Axum handlers.
//! Tokens are opaque values issued by [`TokenService`] and validated on every request.

pub mod client;
pub mod token;

pub use client::ClientRegistry;
pub use token::{IssuedToken, TokenService, DEFAULT_TOKEN_TTL_SECS};

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// Token service errors
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("Unknown client or bad client secret")]
    InvalidClient,

    #[error("Access token is not recognized")]
    Invalid,

    #[error("Access token has expired")]
    Expired,
}

/// Extract the Bearer token from the Authorization header
fn extract_bearer_token(parts: &Parts) -> Result<&str, ApiError> {
    let auth_header = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or_else(|| {
            ApiError::auth_error("AUTH_MISSING_TOKEN", "Missing Authorization header")
        })?;

    let auth_value = auth_header.to_str().map_err(|_| {
        ApiError::auth_error("AUTH_MISSING_TOKEN", "Invalid Authorization header encoding")
    })?;

    match auth_value.strip_prefix("Bearer ").map(str::trim) {
        Some(token) if !token.is_empty() => Ok(token),
        _ => Err(ApiError::auth_error(
            "AUTH_MISSING_TOKEN",
            "Authorization header must use Bearer scheme",
        )),
    }
}

/// Authenticated caller, resolved from a valid bearer token.
///
/// The extractor:
/// 1. Reads `Authorization: Bearer <token>` header
/// 2. Validates the token against the token service
///
/// Returns 401 with structured error codes on any failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub account_id: Uuid,
    pub client_id: String,
}

impl FromRequestParts<AppState> for Principal {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(parts)?;
        Ok(state.tokens.validate_token(token)?)
    }
}

/// Principal holding the `admin` role. Returns 403 for authenticated non-admins.
#[derive(Debug, Clone)]
pub struct AdminPrincipal(pub Principal);

impl FromRequestParts<AppState> for AdminPrincipal {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let principal = Principal::from_request_parts(parts, state).await?;

        if !state.directory.is_admin(principal.account_id).await? {
            tracing::warn!(account_id = %principal.account_id, "Admin route denied");
            return Err(ApiError::forbidden("Administrator role required"));
        }

        Ok(AdminPrincipal(principal))
    }
}

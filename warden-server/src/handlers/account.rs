//! Registration and OAuth2 token endpoints

use axum::{
    extract::{rejection::FormRejection, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Form, Json,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::db::AccountResponse;
use crate::directory::DirectoryError;
use crate::error::{ApiError, ApiJson};
use crate::state::AppState;

/// Request for account registration
#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    #[schema(example = "alice@example.com")]
    pub email: String,
    #[schema(example = "correct-horse-battery-staple")]
    pub password: String,
    /// Display name; defaults to the local part of the email
    #[serde(default)]
    #[schema(example = "Alice")]
    pub name: String,
}

/// Register a new account
#[utoipa::path(
    post,
    path = "/register",
    tag = "Accounts",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = AccountResponse),
        (status = 400, description = "Missing or invalid email or password"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn register_handler(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<AccountResponse>), ApiError> {
    let id = state
        .directory
        .create_account(&request.email, &request.password, &request.name)
        .await?;
    let account = state.directory.get(id).await?;

    Ok((StatusCode::CREATED, Json(AccountResponse::from(account))))
}

/// Resource-owner password credentials grant (RFC 6749 section 4.3)
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct TokenRequest {
    #[schema(example = "password")]
    pub grant_type: Option<String>,
    #[schema(example = "alice@example.com")]
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// Accepted and ignored
    pub scope: Option<String>,
}

/// Successful token response
#[derive(Debug, Serialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    #[schema(example = "Bearer")]
    pub token_type: &'static str,
    /// Lifetime in seconds
    #[schema(example = 3600)]
    pub expires_in: i64,
}

/// Token revocation request (RFC 7009)
#[derive(Debug, Deserialize, ToSchema)]
pub struct RevokeRequest {
    pub token: Option<String>,
    pub token_type_hint: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

/// Client credentials from HTTP Basic, falling back to the form body
fn client_credentials(
    headers: &HeaderMap,
    form_id: Option<&str>,
    form_secret: Option<&str>,
) -> Result<(String, String), ApiError> {
    if let Some(value) = headers.get(header::AUTHORIZATION) {
        let basic = value
            .to_str()
            .ok()
            .and_then(|v| v.strip_prefix("Basic "))
            .ok_or_else(|| ApiError::oauth("invalid_client", "Unsupported client authentication"))?;
        let decoded = BASE64
            .decode(basic.trim())
            .ok()
            .and_then(|raw| String::from_utf8(raw).ok())
            .ok_or_else(|| ApiError::oauth("invalid_client", "Malformed Basic credentials"))?;
        let (id, secret) = decoded
            .split_once(':')
            .ok_or_else(|| ApiError::oauth("invalid_client", "Malformed Basic credentials"))?;
        return Ok((id.to_string(), secret.to_string()));
    }

    match (form_id, form_secret) {
        (Some(id), Some(secret)) if !id.is_empty() => Ok((id.to_string(), secret.to_string())),
        _ => Err(ApiError::oauth("invalid_client", "Client authentication required")),
    }
}

/// Issue an access token
///
/// Form-encoded resource-owner password grant. Client credentials go in the form
/// (`client_id`, `client_secret`) or in an HTTP Basic header.
#[utoipa::path(
    post,
    path = "/token",
    tag = "Accounts",
    request_body(content = TokenRequest, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Token issued", body = TokenResponse),
        (status = 400, description = "OAuth2 error: invalid_request, invalid_client, invalid_grant or unsupported_grant_type")
    )
)]
pub async fn token_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    form: Result<Form<TokenRequest>, FormRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Form(request) = form.map_err(|e| ApiError::oauth("invalid_request", e.body_text()))?;

    let (client_id, client_secret) = client_credentials(
        &headers,
        request.client_id.as_deref(),
        request.client_secret.as_deref(),
    )?;
    state
        .tokens
        .clients()
        .authenticate_client(&client_id, &client_secret)?;

    match request.grant_type.as_deref() {
        Some("password") => {}
        Some(other) => {
            return Err(ApiError::oauth(
                "unsupported_grant_type",
                format!("grant_type {other:?} is not supported"),
            ))
        }
        None => return Err(ApiError::oauth("invalid_request", "grant_type is required")),
    }

    let (username, password) = match (request.username, request.password) {
        (Some(u), Some(p)) => (u, p),
        _ => {
            return Err(ApiError::oauth(
                "invalid_request",
                "username and password are required",
            ))
        }
    };

    let account_id = state
        .directory
        .authenticate(&username, &password)
        .await
        .map_err(|e| match e {
            DirectoryError::AuthFailed => ApiError::oauth("invalid_grant", "Invalid credentials"),
            other => ApiError::from(other),
        })?;

    let issued = state.tokens.issue_token(account_id, &client_id)?;

    Ok((
        [(header::CACHE_CONTROL, "no-store")],
        Json(TokenResponse {
            expires_in: issued.expires_in,
            access_token: issued.token,
            token_type: "Bearer",
        }),
    ))
}

/// Revoke an access token
///
/// Always answers 200 for an authenticated client, whether or not the token existed.
#[utoipa::path(
    post,
    path = "/token/revoke",
    tag = "Accounts",
    request_body(content = RevokeRequest, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Token revoked or unknown"),
        (status = 400, description = "OAuth2 error: invalid_request or invalid_client")
    )
)]
pub async fn revoke_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    form: Result<Form<RevokeRequest>, FormRejection>,
) -> Result<StatusCode, ApiError> {
    let Form(request) = form.map_err(|e| ApiError::oauth("invalid_request", e.body_text()))?;

    let (client_id, client_secret) = client_credentials(
        &headers,
        request.client_id.as_deref(),
        request.client_secret.as_deref(),
    )?;
    state
        .tokens
        .clients()
        .authenticate_client(&client_id, &client_secret)?;

    let token = request
        .token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::oauth("invalid_request", "token is required"))?;

    state.tokens.revoke_token(&token);
    Ok(StatusCode::OK)
}

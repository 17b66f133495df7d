//! WebAuthn HTTP endpoint handlers
//!
//! Implements passkey registration for the authenticated account.

use axum::{extract::State, Json};

use super::types::{BeginRegistrationResponse, FinishRegistrationRequest};
use crate::auth::Principal;
use crate::db::CredentialSummary;
use crate::error::{ApiError, ApiJson};
use crate::state::AppState;

/// POST /webauthn/register/begin
///
/// Start passkey registration for the calling account.
/// Returns creation options and the session reference to send back on finish.
#[utoipa::path(
    post,
    path = "/webauthn/register/begin",
    tag = "WebAuthn",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Registration challenge created", body = BeginRegistrationResponse),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Account not found"),
        (status = 500, description = "Failed to generate challenge")
    )
)]
pub async fn begin_registration(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<BeginRegistrationResponse>, ApiError> {
    let account = state.directory.get(principal.account_id).await?;

    let begun = state.ceremony.begin_registration(&account).await?;

    Ok(Json(BeginRegistrationResponse {
        session_id: begun.session_id,
        public_key: begun.options,
    }))
}

/// POST /webauthn/register/finish
///
/// Complete passkey registration with the authenticator's response.
///
/// Request body carries the session reference and the `PublicKeyCredential` from the browser.
#[utoipa::path(
    post,
    path = "/webauthn/register/finish",
    tag = "WebAuthn",
    security(("bearer" = [])),
    request_body = FinishRegistrationRequest,
    responses(
        (status = 200, description = "Registration completed", body = CredentialSummary),
        (status = 400, description = "Unknown session, challenge/origin mismatch or malformed response"),
        (status = 401, description = "Missing or invalid token"),
        (status = 500, description = "Registration failed")
    )
)]
pub async fn finish_registration(
    State(state): State<AppState>,
    principal: Principal,
    ApiJson(req): ApiJson<FinishRegistrationRequest>,
) -> Result<Json<CredentialSummary>, ApiError> {
    let credential = state
        .ceremony
        .finish_registration(&req.session_id, principal.account_id, &req.response)
        .await?;

    Ok(Json(CredentialSummary::from(&credential)))
}

//! Profile handlers for the calling account

use axum::{extract::State, Json};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::auth::Principal;
use crate::db::AccountResponse;
use crate::error::{ApiError, ApiJson};
use crate::state::AppState;

/// Request for a profile update
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    /// New display name
    #[schema(example = "Alice Liddell")]
    pub name: String,
}

/// Get current account profile
#[utoipa::path(
    get,
    path = "/profile",
    tag = "Profile",
    responses(
        (status = 200, description = "Current account profile", body = AccountResponse),
        (status = 401, description = "Missing, invalid or expired token"),
        (status = 404, description = "Account no longer exists")
    ),
    security(("bearer" = []))
)]
pub async fn get_profile_handler(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<AccountResponse>, ApiError> {
    let account = state.directory.get(principal.account_id).await?;
    Ok(Json(AccountResponse::from(account)))
}

/// Update the display name of the current account
#[utoipa::path(
    put,
    path = "/profile",
    tag = "Profile",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = AccountResponse),
        (status = 400, description = "Empty name"),
        (status = 401, description = "Missing, invalid or expired token"),
        (status = 404, description = "Account no longer exists"),
        (status = 500, description = "Storage failure")
    ),
    security(("bearer" = []))
)]
pub async fn update_profile_handler(
    State(state): State<AppState>,
    principal: Principal,
    ApiJson(request): ApiJson<UpdateProfileRequest>,
) -> Result<Json<AccountResponse>, ApiError> {
    let account = state
        .directory
        .update_display_name(principal.account_id, &request.name)
        .await?;
    Ok(Json(AccountResponse::from(account)))
}

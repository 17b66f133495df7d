//! Administrative handlers
//!
//! Every route here requires the `admin` role.

use axum::{
    extract::{rejection::PathRejection, Path, State},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::AdminPrincipal;
use crate::db::{AccountResponse, Permission, Role};
use crate::error::ApiError;
use crate::state::AppState;

/// Role with its permissions
#[derive(Debug, Serialize, ToSchema)]
pub struct RoleResponse {
    pub name: Role,
    pub permissions: Vec<Permission>,
}

/// Response for account deletion
#[derive(Debug, Serialize, ToSchema)]
pub struct DeleteUserResponse {
    /// Deleted account id
    #[schema(value_type = String)]
    pub id: Uuid,
    /// Access tokens revoked along with the account
    pub revoked_tokens: usize,
}

fn account_id(path: Result<Path<Uuid>, PathRejection>) -> Result<Uuid, ApiError> {
    path.map(|Path(id)| id)
        .map_err(|_| ApiError::bad_request("Account id must be a UUID"))
}

/// List all accounts
#[utoipa::path(
    get,
    path = "/users",
    tag = "Admin",
    responses(
        (status = 200, description = "All accounts", body = Vec<AccountResponse>),
        (status = 401, description = "Missing, invalid or expired token"),
        (status = 403, description = "Administrator role required")
    ),
    security(("bearer" = []))
)]
pub async fn list_users_handler(
    State(state): State<AppState>,
    _admin: AdminPrincipal,
) -> Result<Json<Vec<AccountResponse>>, ApiError> {
    let accounts = state.directory.list().await?;
    Ok(Json(accounts.into_iter().map(AccountResponse::from).collect()))
}

/// Get one account
#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "Admin",
    params(("id" = String, Path, description = "Account id")),
    responses(
        (status = 200, description = "Account", body = AccountResponse),
        (status = 401, description = "Missing, invalid or expired token"),
        (status = 403, description = "Administrator role required"),
        (status = 404, description = "Account not found")
    ),
    security(("bearer" = []))
)]
pub async fn get_user_handler(
    State(state): State<AppState>,
    _admin: AdminPrincipal,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<AccountResponse>, ApiError> {
    let id = account_id(path)?;
    let account = state.directory.get(id).await?;
    Ok(Json(AccountResponse::from(account)))
}

/// Delete an account, its credentials, role grants and live tokens
#[utoipa::path(
    delete,
    path = "/users/{id}",
    tag = "Admin",
    params(("id" = String, Path, description = "Account id")),
    responses(
        (status = 200, description = "Account deleted", body = DeleteUserResponse),
        (status = 401, description = "Missing, invalid or expired token"),
        (status = 403, description = "Administrator role required"),
        (status = 404, description = "Account not found"),
        (status = 500, description = "Storage failure")
    ),
    security(("bearer" = []))
)]
pub async fn delete_user_handler(
    State(state): State<AppState>,
    AdminPrincipal(admin): AdminPrincipal,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<DeleteUserResponse>, ApiError> {
    let id = account_id(path)?;
    state.directory.delete(id).await?;
    let revoked_tokens = state.tokens.revoke_account(id);

    tracing::info!(account_id = %id, admin = %admin.account_id, "Account deleted by admin");

    Ok(Json(DeleteUserResponse { id, revoked_tokens }))
}

/// List roles and their permissions
#[utoipa::path(
    get,
    path = "/roles",
    tag = "Admin",
    responses(
        (status = 200, description = "Static role table", body = Vec<RoleResponse>),
        (status = 401, description = "Missing, invalid or expired token"),
        (status = 403, description = "Administrator role required")
    ),
    security(("bearer" = []))
)]
pub async fn list_roles_handler(_admin: AdminPrincipal) -> Json<Vec<RoleResponse>> {
    Json(
        Role::ALL
            .iter()
            .map(|role| RoleResponse {
                name: *role,
                permissions: role.permissions().to_vec(),
            })
            .collect(),
    )
}

/// List permissions
#[utoipa::path(
    get,
    path = "/permissions",
    tag = "Admin",
    responses(
        (status = 200, description = "Static permission list", body = Vec<Permission>),
        (status = 401, description = "Missing, invalid or expired token"),
        (status = 403, description = "Administrator role required")
    ),
    security(("bearer" = []))
)]
pub async fn list_permissions_handler(_admin: AdminPrincipal) -> Json<Vec<Permission>> {
    Json(Permission::ALL.to_vec())
}

//! HTTP request handlers
//!
//! This module contains all the request handlers for the API endpoints.
//! WebAuthn handlers live in [`crate::webauthn::handlers`].

pub mod account;
pub mod admin;
pub mod health;
pub mod profile;

pub use crate::state::AppState;
pub use account::{
    register_handler, revoke_handler, token_handler, RegisterRequest, RevokeRequest,
    TokenRequest, TokenResponse,
};
pub use admin::{
    delete_user_handler, get_user_handler, list_permissions_handler, list_roles_handler,
    list_users_handler, DeleteUserResponse, RoleResponse,
};
pub use health::{health, ready, HealthResponse, ReadyResponse};
pub use profile::{get_profile_handler, update_profile_handler, UpdateProfileRequest};

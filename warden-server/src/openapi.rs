//! OpenAPI documentation configuration
//!
//! Generates OpenAPI 3.0 specification for the Warden identity API.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::db::{AccountResponse, Attachment, CredentialSummary, Permission, Role};
use crate::handlers::{
    DeleteUserResponse, HealthResponse, ReadyResponse, RegisterRequest, RevokeRequest,
    RoleResponse, TokenRequest, TokenResponse, UpdateProfileRequest,
};
use crate::webauthn::{BeginRegistrationResponse, FinishRegistrationRequest};

/// Warden identity API - OpenAPI Documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Warden - Identity API",
        version = "0.1.0",
        description = r#"
## Identity and Access API

Warden manages accounts, access tokens and passkeys:

- **Accounts** - email/password registration with Argon2id hashing
- **Tokens** - OAuth2 resource-owner password grant issuing opaque bearer tokens
- **Passkeys** - WebAuthn registration ceremonies bound to the signed-in account
- **RBAC** - `admin` and `user` roles gating the administrative routes

### How It Works

1. **Register** via `POST /register`
2. Exchange email and password for a token via `POST /token` (form-encoded)
3. Send `Authorization: Bearer <token>` on protected routes
4. Optionally enrol a passkey via `POST /webauthn/register/begin` then `/finish`
"#,
        license(name = "MIT OR Apache-2.0")
    ),
    servers(
        (url = "http://localhost:3000", description = "Local development server")
    ),
    tags(
        (name = "Accounts", description = "Registration and token issuance"),
        (name = "Profile", description = "Profile of the signed-in account"),
        (name = "Admin", description = "Account, role and permission administration"),
        (name = "WebAuthn", description = "Passkey registration ceremonies"),
        (name = "Health", description = "Service health and readiness endpoints")
    ),
    paths(
        crate::handlers::health::health,
        crate::handlers::health::ready,
        crate::handlers::account::register_handler,
        crate::handlers::account::token_handler,
        crate::handlers::account::revoke_handler,
        crate::handlers::profile::get_profile_handler,
        crate::handlers::profile::update_profile_handler,
        crate::handlers::admin::list_users_handler,
        crate::handlers::admin::get_user_handler,
        crate::handlers::admin::delete_user_handler,
        crate::handlers::admin::list_roles_handler,
        crate::handlers::admin::list_permissions_handler,
        crate::webauthn::handlers::begin_registration,
        crate::webauthn::handlers::finish_registration,
    ),
    components(
        schemas(
            HealthResponse,
            ReadyResponse,
            RegisterRequest,
            TokenRequest,
            TokenResponse,
            RevokeRequest,
            UpdateProfileRequest,
            AccountResponse,
            DeleteUserResponse,
            RoleResponse,
            Role,
            Permission,
            BeginRegistrationResponse,
            FinishRegistrationRequest,
            CredentialSummary,
            Attachment,
        )
    ),
    modifiers(&BearerAuth)
)]
pub struct ApiDoc;

/// Registers the `bearer` security scheme referenced by protected paths
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}

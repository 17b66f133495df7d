//! Warden Server Library - identity and access components
//!
//! This library exposes the server components for use in integration tests.
//! The main binary uses these same components.

pub mod auth;
pub mod config;
pub mod db;
pub mod directory;
pub mod error;
pub mod handlers;
pub mod openapi;
pub mod routes;
pub mod state;
pub mod webauthn;

pub use auth::{AdminPrincipal, ClientRegistry, IssuedToken, Principal, TokenError, TokenService};
pub use config::Config;
pub use db::{
    Account, AccountRepository, AccountResponse, Credential, CredentialRepository,
    CredentialSummary, Permission, Role, RoleRepository, StorageError,
};
pub use directory::{DirectoryError, PasswordPolicy, UserDirectory};
pub use error::{ApiError, ApiJson};
pub use openapi::ApiDoc;
pub use routes::{create_router, RouterError};
pub use state::{AppState, StateError};
pub use webauthn::{CeremonyError, RegistrationCeremony, RelyingParty, SessionBinder};

//! WebAuthn/FIDO2 passkey registration module
//!
//! ## Architecture
//!
//! - `config`: Relying Party identity and the `webauthn-rs` builder
//! - `engine`: attestation engine seam and its `webauthn-rs` implementation
//! - `session`: single-use, TTL-bounded ceremony sessions
//! - `client_data` / `attestation`: response checks done before the engine runs
//! - `ceremony`: begin/finish orchestration
//! - `handlers`: HTTP endpoints
//! - `types`: request/response types and the `IdentityClaims` capability

mod attestation;
mod ceremony;
mod client_data;
mod config;
mod engine;
pub mod handlers;
mod session;
mod types;

pub use attestation::{parse_attestation_object, AttestedCredential};
pub use ceremony::{BegunRegistration, RegistrationCeremony};
pub use config::{ConfigError, RelyingParty};
pub use engine::{CeremonyEngine, StartedRegistration, VerifiedCredential, WebauthnEngine};
pub use handlers::{begin_registration, finish_registration};
pub use session::{CeremonySession, SessionBinder, DEFAULT_SESSION_TTL_SECS};
pub use types::{BeginRegistrationResponse, FinishRegistrationRequest, IdentityClaims};

use crate::db::StorageError;

/// Registration ceremony errors
#[derive(Debug, thiserror::Error)]
pub enum CeremonyError {
    #[error("Registration session not found")]
    SessionNotFound,

    #[error("Registration session expired")]
    SessionExpired,

    #[error("Registration session is bound to another account")]
    AccountMismatch,

    #[error("Challenge does not match the session")]
    ChallengeMismatch,

    #[error("Origin or RP ID not allowed")]
    OriginMismatch,

    #[error("Malformed authenticator response: {0}")]
    ResponseDecode(String),

    #[error("Attestation rejected: {0}")]
    Rejected(String),

    #[error("Ceremony engine error: {0}")]
    Engine(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

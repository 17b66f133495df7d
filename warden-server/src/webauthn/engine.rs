//! Ceremony engine seam
//!
//! The engine builds creation options and verifies attestation statements. The
//! production engine wraps `webauthn-rs`; its registration state is serialized into the
//! ceremony session so it never leaves the server.

use webauthn_rs::prelude::*;

use super::{CeremonyError, IdentityClaims, RelyingParty};

/// Output of the engine's begin step
#[derive(Debug, Clone)]
pub struct StartedRegistration {
    /// `CredentialCreationOptions` for the browser
    pub options: serde_json::Value,
    pub challenge: Vec<u8>,
    /// Engine-private state to hand back on finish
    pub state: serde_json::Value,
}

/// Output of the engine's finish step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedCredential {
    /// Credential id the engine verified
    pub credential_id: Vec<u8>,
    /// Serialized `Passkey` (JSON) for the production engine
    pub public_key: Vec<u8>,
}

pub trait CeremonyEngine: Send + Sync {
    fn start_registration(
        &self,
        identity: &dyn IdentityClaims,
        exclude_credentials: Vec<Vec<u8>>,
    ) -> Result<StartedRegistration, CeremonyError>;

    /// Verify the attestation statement and return the verified credential
    fn finish_registration(
        &self,
        response: &serde_json::Value,
        state: &serde_json::Value,
    ) -> Result<VerifiedCredential, CeremonyError>;
}

/// `webauthn-rs` backed engine
pub struct WebauthnEngine {
    webauthn: Webauthn,
}

impl WebauthnEngine {
    pub fn new(rp: &RelyingParty) -> Result<Self, super::config::ConfigError> {
        Ok(Self {
            webauthn: rp.build_webauthn()?,
        })
    }
}

fn map_webauthn_error(err: WebauthnError) -> CeremonyError {
    match err {
        WebauthnError::MismatchedChallenge => CeremonyError::ChallengeMismatch,
        WebauthnError::InvalidRPOrigin | WebauthnError::InvalidRPIDHash => {
            CeremonyError::OriginMismatch
        }
        other => CeremonyError::Rejected(other.to_string()),
    }
}

impl CeremonyEngine for WebauthnEngine {
    fn start_registration(
        &self,
        identity: &dyn IdentityClaims,
        exclude_credentials: Vec<Vec<u8>>,
    ) -> Result<StartedRegistration, CeremonyError> {
        let exclude_credentials: Vec<CredentialID> = exclude_credentials
            .into_iter()
            .map(CredentialID::from)
            .collect();

        let (ccr, reg_state) = self
            .webauthn
            .start_passkey_registration(
                identity.id(),
                identity.name(),
                identity.display_name(),
                Some(exclude_credentials),
            )
            .map_err(|e| CeremonyError::Engine(format!("Failed to start registration: {e}")))?;

        let challenge: Vec<u8> = ccr.public_key.challenge.clone().into();

        let options = serde_json::to_value(&ccr)
            .map_err(|e| CeremonyError::Engine(format!("Failed to encode options: {e}")))?;
        let state = serde_json::to_value(&reg_state)
            .map_err(|e| CeremonyError::Engine(format!("Failed to serialize registration state: {e}")))?;

        Ok(StartedRegistration {
            options,
            challenge,
            state,
        })
    }

    fn finish_registration(
        &self,
        response: &serde_json::Value,
        state: &serde_json::Value,
    ) -> Result<VerifiedCredential, CeremonyError> {
        let reg: RegisterPublicKeyCredential = serde_json::from_value(response.clone())
            .map_err(|e| CeremonyError::ResponseDecode(format!("registration credential: {e}")))?;
        let reg_state: PasskeyRegistration = serde_json::from_value(state.clone())
            .map_err(|e| CeremonyError::Engine(format!("Corrupt registration state: {e}")))?;

        let passkey = self
            .webauthn
            .finish_passkey_registration(&reg, &reg_state)
            .map_err(map_webauthn_error)?;

        let public_key = serde_json::to_vec(&passkey)
            .map_err(|e| CeremonyError::Engine(format!("Failed to encode passkey: {e}")))?;

        Ok(VerifiedCredential {
            credential_id: passkey.cred_id().clone().into(),
            public_key,
        })
    }
}

impl std::fmt::Debug for WebauthnEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebauthnEngine")
            .field("webauthn", &"<Webauthn instance>")
            .finish()
    }
}

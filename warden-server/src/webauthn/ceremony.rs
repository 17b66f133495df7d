//! Two-phase passkey registration ceremony
//!
//! `begin` asks the engine for a challenge and binds a session to the account.
//! `finish` consumes the session, then checks client data, authenticator data and the
//! attestation statement before anything is written to the credential store.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use super::attestation::parse_attestation_object;
use super::client_data::{decode_b64url, verify_registration_client_data};
use super::engine::CeremonyEngine;
use super::session::SessionBinder;
use super::types::RegistrationResponse;
use super::{CeremonyError, IdentityClaims, RelyingParty};
use crate::db::{Attachment, Credential, CredentialRepository};

/// Result of the begin step
#[derive(Debug, Clone)]
pub struct BegunRegistration {
    pub session_id: String,
    pub options: serde_json::Value,
}

pub struct RegistrationCeremony {
    engine: Arc<dyn CeremonyEngine>,
    sessions: SessionBinder,
    credentials: Arc<CredentialRepository>,
    rp: RelyingParty,
}

impl RegistrationCeremony {
    pub fn new(
        engine: Arc<dyn CeremonyEngine>,
        credentials: Arc<CredentialRepository>,
        rp: RelyingParty,
        session_ttl_secs: u64,
    ) -> Self {
        Self {
            engine,
            sessions: SessionBinder::new(session_ttl_secs),
            credentials,
            rp,
        }
    }

    pub fn sessions(&self) -> &SessionBinder {
        &self.sessions
    }

    /// Start a registration for `identity`, excluding its existing credentials
    pub async fn begin_registration(
        &self,
        identity: &dyn IdentityClaims,
    ) -> Result<BegunRegistration, CeremonyError> {
        let account_id = identity.id();
        let exclude = self
            .credentials
            .load_credentials(account_id)
            .await?
            .into_iter()
            .map(|c| c.credential_id)
            .collect::<Vec<_>>();
        let excluded = exclude.len();

        let started = self.engine.start_registration(identity, exclude)?;
        let session_id = self
            .sessions
            .bind(account_id, started.challenge, started.state);

        tracing::info!(
            account_id = %account_id,
            excluded_credentials = excluded,
            "WebAuthn registration started"
        );

        Ok(BegunRegistration {
            session_id,
            options: started.options,
        })
    }

    /// Complete a registration. The session is consumed whether or not this succeeds.
    pub async fn finish_registration(
        &self,
        session_id: &str,
        account_id: Uuid,
        client_response: &serde_json::Value,
    ) -> Result<Credential, CeremonyError> {
        let result = self
            .verify_and_store(session_id, account_id, client_response)
            .await;

        match &result {
            Ok(credential) => tracing::info!(
                account_id = %account_id,
                fmt = %credential.attestation_type,
                "WebAuthn registration completed"
            ),
            Err(e) => tracing::warn!(
                account_id = %account_id,
                error = %e,
                "WebAuthn registration failed"
            ),
        }
        result
    }

    async fn verify_and_store(
        &self,
        session_id: &str,
        account_id: Uuid,
        client_response: &serde_json::Value,
    ) -> Result<Credential, CeremonyError> {
        let session = self.sessions.take(session_id, account_id)?;

        let parsed: RegistrationResponse = serde_json::from_value(client_response.clone())
            .map_err(|e| CeremonyError::ResponseDecode(format!("registration response: {e}")))?;

        verify_registration_client_data(
            &parsed.response.client_data_json,
            &session.challenge,
            &self.rp,
        )?;

        let attestation_object = decode_b64url(&parsed.response.attestation_object)?;
        let attested = parse_attestation_object(&attestation_object, &self.rp.id_hash())?;

        let verified = self
            .engine
            .finish_registration(client_response, &session.engine_state)?;
        if verified.credential_id != attested.credential_id {
            return Err(CeremonyError::Rejected(
                "credential id differs from the attested credential".to_string(),
            ));
        }

        let credential = Credential {
            credential_id: attested.credential_id,
            public_key: verified.public_key,
            attestation_type: attested.fmt,
            transports: parsed
                .response
                .transports
                .unwrap_or_default()
                .into_iter()
                .collect::<BTreeSet<_>>(),
            sign_count: attested.sign_count,
            aaguid: attested.aaguid.to_vec(),
            attachment: parsed
                .authenticator_attachment
                .as_deref()
                .map(Attachment::parse)
                .unwrap_or_default(),
            clone_warning: false,
            created_at: Utc::now(),
        };

        self.credentials
            .store_credential(account_id, &credential)
            .await?;

        Ok(credential)
    }
}

impl std::fmt::Debug for RegistrationCeremony {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrationCeremony")
            .field("rp_id", &self.rp.id())
            .field("sessions", &self.sessions)
            .finish()
    }
}

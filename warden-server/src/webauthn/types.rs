//! WebAuthn request/response types
//!
//! Defines the data structures for WebAuthn API communication.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::Account;

/// Identity presented to the ceremony engine when creating credentials.
///
/// Anything exposing these accessors can enrol a credential; the engine never sees
/// the storage representation.
pub trait IdentityClaims: Send + Sync {
    /// Stable identifier, used as the WebAuthn user handle
    fn id(&self) -> Uuid;
    /// Account name shown by authenticators (e.g. email)
    fn name(&self) -> &str;
    fn display_name(&self) -> &str;
    fn icon(&self) -> Option<&str> {
        None
    }
}

impl IdentityClaims for Account {
    fn id(&self) -> Uuid {
        self.id
    }

    fn name(&self) -> &str {
        &self.email
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }
}

/// Response containing the registration challenge
#[derive(Debug, Serialize, ToSchema)]
pub struct BeginRegistrationResponse {
    /// Opaque reference to pass back to the finish endpoint
    #[schema(example = "5c1f5e0e-8f0a-4a43-9a2b-0a5b1f1a2c3d")]
    pub session_id: String,
    /// WebAuthn credential creation options (to be passed to navigator.credentials.create)
    #[schema(value_type = Object)]
    pub public_key: serde_json::Value,
}

/// Request to complete registration
#[derive(Debug, Deserialize, ToSchema)]
pub struct FinishRegistrationRequest {
    /// Session reference from begin
    pub session_id: String,
    /// `PublicKeyCredential` from navigator.credentials.create, JSON-encoded
    #[schema(value_type = Object)]
    pub response: serde_json::Value,
}

/// Browser registration response, only the fields the server inspects
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RegistrationResponse {
    pub response: AttestationResponse,
    #[serde(default)]
    pub authenticator_attachment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AttestationResponse {
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: String,
    #[serde(rename = "attestationObject")]
    pub attestation_object: String,
    #[serde(default)]
    pub transports: Option<Vec<String>>,
}

//! `clientDataJSON` validation

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;

use super::{CeremonyError, RelyingParty};

const CREATE_TYPE: &str = "webauthn.create";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CollectedClientData {
    #[serde(rename = "type")]
    pub ceremony_type: String,
    pub challenge: String,
    pub origin: String,
    #[serde(default)]
    pub cross_origin: Option<bool>,
}

/// Decode base64url, tolerating padding some clients leave on
pub(crate) fn decode_b64url(value: &str) -> Result<Vec<u8>, CeremonyError> {
    URL_SAFE_NO_PAD
        .decode(value.trim_end_matches('='))
        .map_err(|e| CeremonyError::ResponseDecode(format!("invalid base64url: {e}")))
}

/// Check a registration `clientDataJSON` against the session challenge and the RP origins
pub(crate) fn verify_registration_client_data(
    encoded: &str,
    expected_challenge: &[u8],
    rp: &RelyingParty,
) -> Result<CollectedClientData, CeremonyError> {
    let raw = decode_b64url(encoded)?;
    let client_data: CollectedClientData = serde_json::from_slice(&raw)
        .map_err(|e| CeremonyError::ResponseDecode(format!("clientDataJSON: {e}")))?;

    if client_data.ceremony_type != CREATE_TYPE {
        return Err(CeremonyError::ResponseDecode(format!(
            "unexpected client data type {:?}",
            client_data.ceremony_type
        )));
    }

    let challenge = decode_b64url(&client_data.challenge)
        .map_err(|_| CeremonyError::ChallengeMismatch)?;
    if challenge != expected_challenge {
        return Err(CeremonyError::ChallengeMismatch);
    }

    if client_data.cross_origin == Some(true) || !rp.is_allowed_origin(&client_data.origin) {
        tracing::warn!(origin = %client_data.origin, "Client data origin rejected");
        return Err(CeremonyError::OriginMismatch);
    }

    Ok(client_data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rp() -> RelyingParty {
        RelyingParty::new("localhost", "Warden", &["http://localhost:3000"]).unwrap()
    }

    fn encode(json: serde_json::Value) -> String {
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(&json).unwrap())
    }

    fn client_data(ty: &str, challenge: &[u8], origin: &str) -> String {
        encode(serde_json::json!({
            "type": ty,
            "challenge": URL_SAFE_NO_PAD.encode(challenge),
            "origin": origin,
            "crossOrigin": false
        }))
    }

    #[test]
    fn test_valid_client_data() {
        let encoded = client_data("webauthn.create", b"challenge-1", "http://localhost:3000");
        let parsed = verify_registration_client_data(&encoded, b"challenge-1", &rp()).unwrap();
        assert_eq!(parsed.origin, "http://localhost:3000");
    }

    #[test]
    fn test_padded_input_is_accepted() {
        let encoded = format!(
            "{}==",
            client_data("webauthn.create", b"c", "http://localhost:3000")
        );
        assert!(verify_registration_client_data(&encoded, b"c", &rp()).is_ok());
    }

    #[test]
    fn test_challenge_mismatch() {
        let encoded = client_data("webauthn.create", b"other", "http://localhost:3000");
        assert!(matches!(
            verify_registration_client_data(&encoded, b"challenge-1", &rp()),
            Err(CeremonyError::ChallengeMismatch)
        ));
    }

    #[test]
    fn test_origin_mismatch() {
        let encoded = client_data("webauthn.create", b"c", "https://phish.example");
        assert!(matches!(
            verify_registration_client_data(&encoded, b"c", &rp()),
            Err(CeremonyError::OriginMismatch)
        ));
    }

    #[test]
    fn test_assertion_type_is_rejected() {
        let encoded = client_data("webauthn.get", b"c", "http://localhost:3000");
        assert!(matches!(
            verify_registration_client_data(&encoded, b"c", &rp()),
            Err(CeremonyError::ResponseDecode(_))
        ));
    }

    #[test]
    fn test_garbage_is_a_decode_error() {
        assert!(matches!(
            verify_registration_client_data("%%%", b"c", &rp()),
            Err(CeremonyError::ResponseDecode(_))
        ));
        let not_json = URL_SAFE_NO_PAD.encode(b"not json");
        assert!(matches!(
            verify_registration_client_data(&not_json, b"c", &rp()),
            Err(CeremonyError::ResponseDecode(_))
        ));
    }
}

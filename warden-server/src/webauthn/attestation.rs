//! Attestation object parsing
//!
//! The attestation object is a CBOR map `{fmt, attStmt, authData}`. `authData` is laid
//! out as:
//!
//! | bytes | field |
//! |---|---|
//! | 32 | RP ID hash |
//! | 1 | flags |
//! | 4 | sign count (big endian) |
//! | 16 | AAGUID (when AT is set) |
//! | 2 | credential id length (big endian) |
//! | L | credential id |
//! | .. | credential public key (COSE) and extensions |
//!
//! Statement signatures are checked by the ceremony engine, not here.

use ciborium::Value;

use super::CeremonyError;

const FLAG_USER_PRESENT: u8 = 0x01;
const FLAG_USER_VERIFIED: u8 = 0x04;
const FLAG_ATTESTED_DATA: u8 = 0x40;

const RP_ID_HASH_LEN: usize = 32;
const HEADER_LEN: usize = RP_ID_HASH_LEN + 1 + 4;
const AAGUID_LEN: usize = 16;

/// Fields pulled from a parsed attestation object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestedCredential {
    pub fmt: String,
    pub aaguid: [u8; 16],
    pub credential_id: Vec<u8>,
    pub sign_count: u32,
    pub user_verified: bool,
}

fn decode_error(msg: impl Into<String>) -> CeremonyError {
    CeremonyError::ResponseDecode(msg.into())
}

/// Parse an attestation object and check its RP ID hash
pub fn parse_attestation_object(
    bytes: &[u8],
    expected_rp_id_hash: &[u8; 32],
) -> Result<AttestedCredential, CeremonyError> {
    let value: Value = ciborium::de::from_reader(bytes)
        .map_err(|e| decode_error(format!("attestationObject is not CBOR: {e}")))?;

    let entries = value
        .as_map()
        .ok_or_else(|| decode_error("attestationObject is not a map"))?;

    let field = |name: &str| {
        entries
            .iter()
            .find(|(k, _)| k.as_text() == Some(name))
            .map(|(_, v)| v)
    };

    let fmt = field("fmt")
        .and_then(Value::as_text)
        .ok_or_else(|| decode_error("attestationObject.fmt missing"))?
        .to_string();

    let auth_data = field("authData")
        .and_then(Value::as_bytes)
        .ok_or_else(|| decode_error("attestationObject.authData missing"))?;

    parse_auth_data(fmt, auth_data, expected_rp_id_hash)
}

fn parse_auth_data(
    fmt: String,
    data: &[u8],
    expected_rp_id_hash: &[u8; 32],
) -> Result<AttestedCredential, CeremonyError> {
    if data.len() < HEADER_LEN {
        return Err(decode_error("authData too short"));
    }

    if &data[..RP_ID_HASH_LEN] != expected_rp_id_hash {
        tracing::warn!("Authenticator data RP ID hash does not match");
        return Err(CeremonyError::OriginMismatch);
    }

    let flags = data[RP_ID_HASH_LEN];
    if flags & FLAG_USER_PRESENT == 0 {
        return Err(decode_error("user presence flag not set"));
    }
    if flags & FLAG_ATTESTED_DATA == 0 {
        return Err(decode_error("attested credential data missing"));
    }

    let sign_count = u32::from_be_bytes(
        data[RP_ID_HASH_LEN + 1..HEADER_LEN]
            .try_into()
            .map_err(|_| decode_error("sign count truncated"))?,
    );

    let rest = &data[HEADER_LEN..];
    if rest.len() < AAGUID_LEN + 2 {
        return Err(decode_error("attested credential data truncated"));
    }

    let mut aaguid = [0u8; AAGUID_LEN];
    aaguid.copy_from_slice(&rest[..AAGUID_LEN]);

    let id_len = u16::from_be_bytes([rest[AAGUID_LEN], rest[AAGUID_LEN + 1]]) as usize;
    let id_start = AAGUID_LEN + 2;
    let credential_id = rest
        .get(id_start..id_start + id_len)
        .ok_or_else(|| decode_error("credential id truncated"))?
        .to_vec();

    if credential_id.is_empty() {
        return Err(decode_error("empty credential id"));
    }

    Ok(AttestedCredential {
        fmt,
        aaguid,
        credential_id,
        sign_count,
        user_verified: flags & FLAG_USER_VERIFIED != 0,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use sha2::{Digest, Sha256};

    /// Build authData for `rp_id` with the given flags, counter and credential id
    pub(crate) fn auth_data(rp_id: &str, flags: u8, counter: u32, credential_id: &[u8]) -> Vec<u8> {
        let mut data = Sha256::digest(rp_id.as_bytes()).to_vec();
        data.push(flags);
        data.extend_from_slice(&counter.to_be_bytes());
        data.extend_from_slice(&[0xAB; 16]);
        data.extend_from_slice(&(credential_id.len() as u16).to_be_bytes());
        data.extend_from_slice(credential_id);
        // Stand-in for the COSE key
        data.extend_from_slice(&[0xA0]);
        data
    }

    pub(crate) fn attestation_object(fmt: &str, auth_data: Vec<u8>) -> Vec<u8> {
        let value = Value::Map(vec![
            (Value::Text("fmt".into()), Value::Text(fmt.into())),
            (Value::Text("attStmt".into()), Value::Map(vec![])),
            (Value::Text("authData".into()), Value::Bytes(auth_data)),
        ]);
        let mut out = Vec::new();
        ciborium::ser::into_writer(&value, &mut out).unwrap();
        out
    }

    fn rp_hash(rp_id: &str) -> [u8; 32] {
        Sha256::digest(rp_id.as_bytes()).into()
    }

    #[test]
    fn test_parse_valid_object() {
        let object = attestation_object("none", auth_data("localhost", 0x45, 7, b"cred-1"));
        let parsed = parse_attestation_object(&object, &rp_hash("localhost")).unwrap();

        assert_eq!(parsed.fmt, "none");
        assert_eq!(parsed.credential_id, b"cred-1");
        assert_eq!(parsed.sign_count, 7);
        assert_eq!(parsed.aaguid, [0xAB; 16]);
        assert!(parsed.user_verified);
    }

    #[test]
    fn test_rp_id_hash_mismatch() {
        let object = attestation_object("none", auth_data("evil.example", 0x41, 0, b"cred"));
        assert!(matches!(
            parse_attestation_object(&object, &rp_hash("localhost")),
            Err(CeremonyError::OriginMismatch)
        ));
    }

    #[test]
    fn test_user_presence_required() {
        let object = attestation_object("none", auth_data("localhost", 0x40, 0, b"cred"));
        assert!(matches!(
            parse_attestation_object(&object, &rp_hash("localhost")),
            Err(CeremonyError::ResponseDecode(_))
        ));
    }

    #[test]
    fn test_attested_data_required() {
        let object = attestation_object("none", auth_data("localhost", 0x01, 0, b"cred"));
        assert!(matches!(
            parse_attestation_object(&object, &rp_hash("localhost")),
            Err(CeremonyError::ResponseDecode(_))
        ));
    }

    #[test]
    fn test_truncated_credential_id() {
        let mut data = auth_data("localhost", 0x41, 0, b"cred");
        // Claim a longer id than present
        let len_at = HEADER_LEN + AAGUID_LEN;
        data[len_at..len_at + 2].copy_from_slice(&500u16.to_be_bytes());
        let object = attestation_object("packed", data);
        assert!(matches!(
            parse_attestation_object(&object, &rp_hash("localhost")),
            Err(CeremonyError::ResponseDecode(_))
        ));
    }

    #[test]
    fn test_not_cbor() {
        assert!(matches!(
            parse_attestation_object(b"\xff\xff", &rp_hash("localhost")),
            Err(CeremonyError::ResponseDecode(_))
        ));
        assert!(matches!(
            parse_attestation_object(&[0x01], &rp_hash("localhost")),
            Err(CeremonyError::ResponseDecode(_))
        ));
    }
}

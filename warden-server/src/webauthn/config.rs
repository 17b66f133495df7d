//! WebAuthn Relying Party configuration
//!
//! Holds the Relying Party (RP) identity used both by the ceremony engine and by the
//! client-data and authenticator-data checks.

use sha2::{Digest, Sha256};
use url::Url;
use webauthn_rs::prelude::*;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid origin URL: {0}")]
    InvalidOrigin(String),
    #[error("At least one allowed origin is required")]
    NoOrigin,
    #[error("WebAuthn error: {0:?}")]
    Webauthn(WebauthnError),
}

/// Relying Party identity
#[derive(Debug, Clone)]
pub struct RelyingParty {
    id: String,
    name: String,
    origins: Vec<Url>,
}

impl RelyingParty {
    /// Create a Relying Party
    ///
    /// # Arguments
    ///
    /// * `rp_id` - Relying Party ID (typically the domain name)
    /// * `rp_name` - Human-readable name for the Relying Party
    /// * `origins` - Origins allowed to run ceremonies, e.g. `https://app.example.com`
    pub fn new<S: AsRef<str>>(rp_id: &str, rp_name: &str, origins: &[S]) -> Result<Self, ConfigError> {
        let origins = origins
            .iter()
            .map(|o| Url::parse(o.as_ref()).map_err(|e| ConfigError::InvalidOrigin(format!("{}: {e}", o.as_ref()))))
            .collect::<Result<Vec<_>, _>>()?;

        if origins.is_empty() {
            return Err(ConfigError::NoOrigin);
        }

        Ok(Self {
            id: rp_id.to_string(),
            name: rp_name.to_string(),
            origins,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn origins(&self) -> &[Url] {
        &self.origins
    }

    /// SHA-256 of the RP ID, as carried in authenticator data
    pub fn id_hash(&self) -> [u8; 32] {
        Sha256::digest(self.id.as_bytes()).into()
    }

    /// Whether a client-reported origin (`scheme://host[:port]`) is allowed
    pub fn is_allowed_origin(&self, origin: &str) -> bool {
        match Url::parse(origin) {
            Ok(url) => self.origins.iter().any(|allowed| allowed.origin() == url.origin()),
            Err(_) => false,
        }
    }

    /// Build the `webauthn-rs` instance for this Relying Party
    pub fn build_webauthn(&self) -> Result<Webauthn, ConfigError> {
        let (first, rest) = self.origins.split_first().ok_or(ConfigError::NoOrigin)?;

        let mut builder = WebauthnBuilder::new(&self.id, first)
            .map_err(ConfigError::Webauthn)?
            .rp_name(&self.name)
            .allow_subdomains(false);
        for origin in rest {
            builder = builder.append_allowed_origin(origin);
        }

        builder.build().map_err(ConfigError::Webauthn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn localhost() -> RelyingParty {
        RelyingParty::new("localhost", "Warden", &["http://localhost:3000"]).unwrap()
    }

    #[test]
    fn test_webauthn_creation() {
        let rp = localhost();
        let webauthn = rp.build_webauthn().unwrap();
        let origin = Url::parse("http://localhost:3000").unwrap();
        assert!(webauthn.get_allowed_origins().contains(&origin));
    }

    #[test]
    fn test_origin_allow_list() {
        let rp = RelyingParty::new(
            "example.com",
            "Example",
            &["https://example.com", "https://app.example.com"],
        )
        .unwrap();

        assert!(rp.is_allowed_origin("https://example.com"));
        assert!(rp.is_allowed_origin("https://app.example.com"));
        assert!(!rp.is_allowed_origin("https://evil.example.com"));
        assert!(!rp.is_allowed_origin("http://example.com"));
        assert!(!rp.is_allowed_origin("not a url"));
    }

    #[test]
    fn test_id_hash() {
        let expected: [u8; 32] = Sha256::digest(b"localhost").into();
        assert_eq!(localhost().id_hash(), expected);
    }

    #[test]
    fn test_invalid_origins() {
        assert!(matches!(
            RelyingParty::new::<&str>("localhost", "Warden", &[]),
            Err(ConfigError::NoOrigin)
        ));
        assert!(matches!(
            RelyingParty::new("localhost", "Warden", &["::nope"]),
            Err(ConfigError::InvalidOrigin(_))
        ));
    }
}

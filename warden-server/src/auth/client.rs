//! Statically configured OAuth2 client registry

use std::collections::HashMap;

use sha2::{Digest, Sha256};

use super::TokenError;

/// Registered clients, keyed by client id. Secrets are held as SHA-256 digests.
#[derive(Default)]
pub struct ClientRegistry {
    clients: HashMap<String, [u8; 32]>,
}

fn digest(secret: &str) -> [u8; 32] {
    Sha256::digest(secret.as_bytes()).into()
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a client
    pub fn register(&mut self, client_id: impl Into<String>, client_secret: &str) {
        self.clients.insert(client_id.into(), digest(client_secret));
    }

    pub fn with_client(mut self, client_id: impl Into<String>, client_secret: &str) -> Self {
        self.register(client_id, client_secret);
        self
    }

    pub fn contains(&self, client_id: &str) -> bool {
        self.clients.contains_key(client_id)
    }

    /// Check a client id / secret pair
    pub fn authenticate_client(&self, client_id: &str, client_secret: &str) -> Result<(), TokenError> {
        match self.clients.get(client_id) {
            Some(expected) if *expected == digest(client_secret) => Ok(()),
            _ => {
                tracing::debug!(client_id = %client_id, "Client authentication failed");
                Err(TokenError::InvalidClient)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

impl std::fmt::Debug for ClientRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientRegistry")
            .field("clients", &self.clients.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authenticate_client() {
        let registry = ClientRegistry::new().with_client("web", "s3cret");

        assert!(registry.authenticate_client("web", "s3cret").is_ok());
        assert!(matches!(
            registry.authenticate_client("web", "wrong"),
            Err(TokenError::InvalidClient)
        ));
        assert!(matches!(
            registry.authenticate_client("mobile", "s3cret"),
            Err(TokenError::InvalidClient)
        ));
    }

    #[test]
    fn test_debug_does_not_print_secrets() {
        let registry = ClientRegistry::new().with_client("web", "s3cret");
        let printed = format!("{registry:?}");
        assert!(printed.contains("web"));
        assert!(!printed.contains("s3cret"));
    }
}

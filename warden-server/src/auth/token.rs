//! Opaque bearer token issuance and validation
//!
//! Tokens are 256-bit random values encoded base64url. Records live in a sharded
//! [`DashMap`] keyed by the SHA-256 digest of the token, so validation only takes a
//! shard read lock and the raw token value is never held server-side.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::{ClientRegistry, Principal, TokenError};

/// Default access token lifetime
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 3600;

/// Upper bound on the configurable lifetime (one year)
const MAX_TOKEN_TTL_SECS: u64 = 365 * 24 * 3600;

/// How long an expired record is kept so lookups keep answering `Expired`
pub const EXPIRED_TOKEN_RETENTION_SECS: i64 = 24 * 3600;

#[derive(Debug, Clone)]
struct AccessToken {
    account_id: Uuid,
    client_id: String,
    expires_at: DateTime<Utc>,
}

/// A freshly issued token, returned once to the client
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    /// Lifetime in whole seconds at issuance
    pub expires_in: i64,
}

type TokenKey = [u8; 32];

fn token_key(token: &str) -> TokenKey {
    Sha256::digest(token.as_bytes()).into()
}

/// Issues, validates and revokes access tokens
pub struct TokenService {
    tokens: DashMap<TokenKey, AccessToken>,
    clients: ClientRegistry,
    ttl: Duration,
}

impl TokenService {
    pub fn new(clients: ClientRegistry, ttl_secs: u64) -> Self {
        Self {
            tokens: DashMap::new(),
            clients,
            ttl: Duration::seconds(ttl_secs.min(MAX_TOKEN_TTL_SECS) as i64),
        }
    }

    pub fn clients(&self) -> &ClientRegistry {
        &self.clients
    }

    /// Issue a token bound to an account and a registered client
    pub fn issue_token(&self, account_id: Uuid, client_id: &str) -> Result<IssuedToken, TokenError> {
        if !self.clients.contains(client_id) {
            return Err(TokenError::InvalidClient);
        }

        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        let token = URL_SAFE_NO_PAD.encode(bytes);
        let expires_at = Utc::now() + self.ttl;

        self.tokens.insert(
            token_key(&token),
            AccessToken {
                account_id,
                client_id: client_id.to_string(),
                expires_at,
            },
        );

        tracing::info!(account_id = %account_id, client_id = %client_id, "Access token issued");
        Ok(IssuedToken {
            token,
            expires_at,
            expires_in: self.ttl.num_seconds(),
        })
    }

    /// Resolve a token into the principal it was issued to
    ///
    /// Expired records stay readable until [`Self::purge_expired`] drops them after
    /// [`EXPIRED_TOKEN_RETENTION_SECS`], so every lookup past expiry is `Expired`.
    pub fn validate_token(&self, token: &str) -> Result<Principal, TokenError> {
        let record = self.tokens.get(&token_key(token)).ok_or(TokenError::Invalid)?;
        if Utc::now() >= record.expires_at {
            tracing::debug!(account_id = %record.account_id, "Expired access token presented");
            return Err(TokenError::Expired);
        }
        Ok(Principal {
            account_id: record.account_id,
            client_id: record.client_id.clone(),
        })
    }

    /// Revoke one token. Returns whether it existed.
    pub fn revoke_token(&self, token: &str) -> bool {
        let removed = self.tokens.remove(&token_key(token));
        if let Some((_, record)) = &removed {
            tracing::info!(account_id = %record.account_id, "Access token revoked");
        }
        removed.is_some()
    }

    /// Revoke every token of an account
    pub fn revoke_account(&self, account_id: Uuid) -> usize {
        let before = self.tokens.len();
        self.tokens.retain(|_, record| record.account_id != account_id);
        let revoked = before.saturating_sub(self.tokens.len());
        if revoked > 0 {
            tracing::info!(account_id = %account_id, revoked, "Account tokens revoked");
        }
        revoked
    }

    /// Drop records expired for longer than the retention window.
    /// Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Utc::now())
    }

    fn purge_expired_at(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - Duration::seconds(EXPIRED_TOKEN_RETENTION_SECS);
        let before = self.tokens.len();
        self.tokens.retain(|_, record| record.expires_at > cutoff);
        before.saturating_sub(self.tokens.len())
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("live_tokens", &self.tokens.len())
            .field("clients", &self.clients)
            .field("ttl_secs", &self.ttl.num_seconds())
            .finish()
    }
}

//! WebAuthn credential entity and repository
//!
//! Credentials are keyed by `(account_id, credential_id)`. Storing the same key twice
//! upserts; sign counter updates are a single atomic read-modify-write per backend.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use utoipa::ToSchema;
use uuid::Uuid;

use super::StorageError;

/// How the authenticator is attached to the client device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Attachment {
    /// Built into the device (Touch ID, Windows Hello)
    Platform,
    /// Roaming authenticator (security key, phone)
    CrossPlatform,
    /// Client did not report an attachment
    #[default]
    Unspecified,
}

impl Attachment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Platform => "platform",
            Self::CrossPlatform => "cross_platform",
            Self::Unspecified => "unspecified",
        }
    }

    /// Parse both the stored form and the WebAuthn wire form (`cross-platform`)
    pub fn parse(value: &str) -> Self {
        match value {
            "platform" => Self::Platform,
            "cross_platform" | "cross-platform" => Self::CrossPlatform,
            _ => Self::Unspecified,
        }
    }
}

/// A registered public-key credential
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub credential_id: Vec<u8>,
    /// Verified key material as produced by the ceremony engine. For
    /// `WebauthnEngine` this is the serialized `webauthn_rs::prelude::Passkey` (JSON),
    /// not a raw COSE key; decode it with `serde_json` before authentication.
    pub public_key: Vec<u8>,
    /// Attestation statement format (`none`, `packed`, `tpm`, ...)
    pub attestation_type: String,
    pub transports: BTreeSet<String>,
    pub sign_count: u32,
    pub aaguid: Vec<u8>,
    pub attachment: Attachment,
    pub clone_warning: bool,
    pub created_at: DateTime<Utc>,
}

/// Result of applying an authenticator's sign counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignCountOutcome {
    /// Counter moved forward
    Advanced,
    /// Counter did not move (including authenticators without a counter)
    Unchanged,
    /// Counter went backwards; the credential is flagged as possibly cloned
    Regressed,
}

impl Credential {
    /// Apply a counter reported by an authentication ceremony.
    ///
    /// The stored counter never decreases. A regression sets `clone_warning`
    /// but the credential stays usable; callers decide what to do with the outcome.
    pub fn apply_sign_count(&mut self, counter: u32) -> SignCountOutcome {
        let outcome = compare_sign_count(self.sign_count, counter);
        match outcome {
            SignCountOutcome::Advanced => self.sign_count = counter,
            SignCountOutcome::Regressed => self.clone_warning = true,
            SignCountOutcome::Unchanged => {}
        }
        outcome
    }
}

fn compare_sign_count(stored: u32, counter: u32) -> SignCountOutcome {
    use std::cmp::Ordering;
    match counter.cmp(&stored) {
        Ordering::Greater => SignCountOutcome::Advanced,
        Ordering::Equal => SignCountOutcome::Unchanged,
        Ordering::Less => SignCountOutcome::Regressed,
    }
}

/// Credential summary returned to clients
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CredentialSummary {
    /// Credential ID (base64url)
    #[schema(example = "m9Xq3pYt0c8")]
    pub credential_id: String,
    /// Attestation statement format
    #[schema(example = "none")]
    pub attestation_type: String,
    /// Reported transports
    pub transports: Vec<String>,
    pub attachment: Attachment,
    /// AAGUID of the authenticator model
    #[schema(example = "00000000-0000-0000-0000-000000000000")]
    pub aaguid: String,
    pub sign_count: u32,
}

impl From<&Credential> for CredentialSummary {
    fn from(credential: &Credential) -> Self {
        use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
        let aaguid = Uuid::from_slice(&credential.aaguid)
            .map(|u| u.to_string())
            .unwrap_or_default();
        Self {
            credential_id: URL_SAFE_NO_PAD.encode(&credential.credential_id),
            attestation_type: credential.attestation_type.clone(),
            transports: credential.transports.iter().cloned().collect(),
            attachment: credential.attachment,
            aaguid,
            sign_count: credential.sign_count,
        }
    }
}

enum CredentialBackend {
    Postgres(PgPool),
    /// account_id -> (credential_id -> credential)
    Memory(DashMap<Uuid, HashMap<Vec<u8>, Credential>>),
}

/// Repository for WebAuthn credentials
pub struct CredentialRepository {
    backend: CredentialBackend,
}

impl CredentialRepository {
    /// Create a repository backed by PostgreSQL
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            backend: CredentialBackend::Postgres(pool),
        }
    }

    /// Create a repository backed by process memory
    pub fn in_memory() -> Self {
        Self {
            backend: CredentialBackend::Memory(DashMap::new()),
        }
    }

    /// Load every credential registered to an account
    pub async fn load_credentials(&self, account_id: Uuid) -> Result<Vec<Credential>, StorageError> {
        match &self.backend {
            CredentialBackend::Postgres(pool) => {
                let rows = sqlx::query_as::<_, CredentialRow>(
                    r#"
                    SELECT credential_id, public_key, attestation_type, transports,
                           sign_count, aaguid, attachment, clone_warning, created_at
                    FROM webauthn_credentials
                    WHERE account_id = $1
                    "#,
                )
                .bind(account_id)
                .fetch_all(pool)
                .await?;
                rows.into_iter().map(CredentialRow::into_credential).collect()
            }
            CredentialBackend::Memory(map) => Ok(map
                .get(&account_id)
                .map(|creds| creds.values().cloned().collect())
                .unwrap_or_default()),
        }
    }

    /// Upsert a credential keyed by `(account_id, credential_id)`.
    ///
    /// On conflict the public key, sign count, transports, attachment and clone
    /// warning are overwritten (last write wins).
    pub async fn store_credential(
        &self,
        account_id: Uuid,
        credential: &Credential,
    ) -> Result<(), StorageError> {
        match &self.backend {
            CredentialBackend::Postgres(pool) => {
                let transports: Vec<String> = credential.transports.iter().cloned().collect();
                sqlx::query(
                    r#"
                    INSERT INTO webauthn_credentials
                        (account_id, credential_id, public_key, attestation_type, transports,
                         sign_count, aaguid, attachment, clone_warning, created_at)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                    ON CONFLICT (account_id, credential_id) DO UPDATE SET
                        public_key = EXCLUDED.public_key,
                        sign_count = EXCLUDED.sign_count,
                        transports = EXCLUDED.transports,
                        attachment = EXCLUDED.attachment,
                        clone_warning = EXCLUDED.clone_warning
                    "#,
                )
                .bind(account_id)
                .bind(&credential.credential_id)
                .bind(&credential.public_key)
                .bind(&credential.attestation_type)
                .bind(&transports)
                .bind(i64::from(credential.sign_count))
                .bind(&credential.aaguid)
                .bind(credential.attachment.as_str())
                .bind(credential.clone_warning)
                .bind(credential.created_at)
                .execute(pool)
                .await?;
            }
            CredentialBackend::Memory(map) => {
                let mut creds = map.entry(account_id).or_default();
                creds
                    .entry(credential.credential_id.clone())
                    .and_modify(|existing| {
                        existing.public_key = credential.public_key.clone();
                        existing.sign_count = credential.sign_count;
                        existing.transports = credential.transports.clone();
                        existing.attachment = credential.attachment;
                        existing.clone_warning = credential.clone_warning;
                    })
                    .or_insert_with(|| credential.clone());
            }
        }

        tracing::debug!(account_id = %account_id, "Credential stored");
        Ok(())
    }

    /// Apply a sign counter from an authentication ceremony atomically.
    ///
    /// Returns `None` if the credential does not exist.
    pub async fn record_sign_count(
        &self,
        account_id: Uuid,
        credential_id: &[u8],
        counter: u32,
    ) -> Result<Option<SignCountOutcome>, StorageError> {
        let outcome = match &self.backend {
            CredentialBackend::Postgres(pool) => {
                let previous: Option<i64> = sqlx::query_scalar(
                    r#"
                    UPDATE webauthn_credentials AS c
                    SET sign_count = GREATEST(c.sign_count, $3),
                        clone_warning = c.clone_warning OR $3 < c.sign_count
                    FROM (
                        SELECT sign_count FROM webauthn_credentials
                        WHERE account_id = $1 AND credential_id = $2
                        FOR UPDATE
                    ) AS prev
                    WHERE c.account_id = $1 AND c.credential_id = $2
                    RETURNING prev.sign_count
                    "#,
                )
                .bind(account_id)
                .bind(credential_id)
                .bind(i64::from(counter))
                .fetch_optional(pool)
                .await?;

                previous.map(|stored| {
                    let stored = u32::try_from(stored).unwrap_or(u32::MAX);
                    compare_sign_count(stored, counter)
                })
            }
            CredentialBackend::Memory(map) => map.get_mut(&account_id).and_then(|mut creds| {
                creds
                    .get_mut(credential_id)
                    .map(|credential| credential.apply_sign_count(counter))
            }),
        };

        if outcome == Some(SignCountOutcome::Regressed) {
            tracing::warn!(
                account_id = %account_id,
                counter = counter,
                "Sign counter regressed, credential flagged as possibly cloned"
            );
        }

        Ok(outcome)
    }

    /// Remove every credential of an account
    pub async fn delete_for_account(&self, account_id: Uuid) -> Result<u64, StorageError> {
        match &self.backend {
            CredentialBackend::Postgres(pool) => {
                let result = sqlx::query("DELETE FROM webauthn_credentials WHERE account_id = $1")
                    .bind(account_id)
                    .execute(pool)
                    .await?;
                Ok(result.rows_affected())
            }
            CredentialBackend::Memory(map) => Ok(map
                .remove(&account_id)
                .map(|(_, creds)| creds.len() as u64)
                .unwrap_or(0)),
        }
    }
}

impl std::fmt::Debug for CredentialRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let backend = match &self.backend {
            CredentialBackend::Postgres(_) => "PostgreSQL",
            CredentialBackend::Memory(_) => "Memory",
        };
        f.debug_struct("CredentialRepository")
            .field("backend", &backend)
            .finish()
    }
}

/// Database row for credentials
#[derive(FromRow)]
struct CredentialRow {
    credential_id: Vec<u8>,
    public_key: Vec<u8>,
    attestation_type: String,
    transports: Vec<String>,
    sign_count: i64,
    aaguid: Vec<u8>,
    attachment: String,
    clone_warning: bool,
    created_at: DateTime<Utc>,
}

impl CredentialRow {
    fn into_credential(self) -> Result<Credential, StorageError> {
        let sign_count = u32::try_from(self.sign_count).map_err(|_| {
            StorageError::Serialization(format!("sign_count out of range: {}", self.sign_count))
        })?;

        Ok(Credential {
            credential_id: self.credential_id,
            public_key: self.public_key,
            attestation_type: self.attestation_type,
            transports: self.transports.into_iter().collect(),
            sign_count,
            aaguid: self.aaguid,
            attachment: Attachment::parse(&self.attachment),
            clone_warning: self.clone_warning,
            created_at: self.created_at,
        })
    }
}

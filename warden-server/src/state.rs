//! Application state module
//!
//! Defines shared state accessible across all request handlers.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;

use crate::auth::{ClientRegistry, TokenService};
use crate::config::Config;
use crate::db::{AccountRepository, CredentialRepository, RoleRepository};
use crate::directory::{DirectoryError, UserDirectory};
use crate::webauthn::{ConfigError, RegistrationCeremony, RelyingParty, WebauthnEngine};

/// Errors raised while assembling the application state
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("Directory setup failed: {0}")]
    Directory(#[from] DirectoryError),

    #[error("WebAuthn setup failed: {0}")]
    WebAuthn(#[from] ConfigError),
}

/// Application state containing shared resources.
#[derive(Clone)]
pub struct AppState {
    /// Accounts, passwords and role grants
    pub directory: Arc<UserDirectory>,
    /// Opaque access tokens and registered clients
    pub tokens: Arc<TokenService>,
    /// Passkey registration ceremonies
    pub ceremony: Arc<RegistrationCeremony>,
    /// PostgreSQL pool, `None` when running on the in-memory backend
    pub db_pool: Option<PgPool>,
}

impl AppState {
    /// Build the state from configuration.
    ///
    /// Repositories use PostgreSQL when `pool` is given and the in-memory
    /// backend otherwise.
    pub fn build(config: &Config, pool: Option<PgPool>) -> Result<Self, StateError> {
        let (accounts, roles, credentials) = match &pool {
            Some(pool) => (
                AccountRepository::postgres(pool.clone()),
                RoleRepository::postgres(pool.clone()),
                CredentialRepository::postgres(pool.clone()),
            ),
            None => (
                AccountRepository::in_memory(),
                RoleRepository::in_memory(),
                CredentialRepository::in_memory(),
            ),
        };
        let credentials = Arc::new(credentials);

        let directory = UserDirectory::new(
            Arc::new(accounts),
            Arc::new(roles),
            Arc::clone(&credentials),
            config.password_policy,
            config.admin_email.clone(),
        )?;

        let clients = ClientRegistry::new()
            .with_client(&config.oauth_client_id, &config.oauth_client_secret);
        let tokens = TokenService::new(clients, config.token_ttl_secs);

        let rp = RelyingParty::new(
            &config.webauthn_rp_id,
            &config.webauthn_rp_name,
            config.webauthn_rp_origins.as_slice(),
        )?;
        let engine = WebauthnEngine::new(&rp)?;
        let ceremony =
            RegistrationCeremony::new(Arc::new(engine), credentials, rp, config.session_ttl_secs);

        tracing::info!(
            storage = if pool.is_some() { "postgres" } else { "memory" },
            rp_id = %config.webauthn_rp_id,
            "Application state ready"
        );

        Ok(Self {
            directory: Arc::new(directory),
            tokens: Arc::new(tokens),
            ceremony: Arc::new(ceremony),
            db_pool: pool,
        })
    }

    /// Build the state on the in-memory backend
    pub fn in_memory(config: &Config) -> Result<Self, StateError> {
        Self::build(config, None)
    }

    /// Periodically drop expired access tokens and ceremony sessions
    pub fn spawn_sweeper(&self, interval_secs: u64) -> tokio::task::JoinHandle<()> {
        let tokens = Arc::clone(&self.tokens);
        let ceremony = Arc::clone(&self.ceremony);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let tokens_purged = tokens.purge_expired();
                let sessions_purged = ceremony.sessions().sweep_expired();
                if tokens_purged + sessions_purged > 0 {
                    tracing::debug!(tokens_purged, sessions_purged, "Expired entries swept");
                }
            }
        })
    }

    /// In-memory state with a cheap password policy
    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        let config = Config {
            password_policy: crate::directory::PasswordPolicy {
                memory_kib: 1024,
                iterations: 1,
                parallelism: 1,
            },
            ..Config::default()
        };
        match Self::in_memory(&config) {
            Ok(state) => state,
            Err(e) => panic!("test state: {e}"),
        }
    }
}

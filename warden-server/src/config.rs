//! Server configuration module
//!
//! Handles loading configuration from environment variables with sensible defaults.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;

use crate::auth::DEFAULT_TOKEN_TTL_SECS;
use crate::directory::PasswordPolicy;
use crate::webauthn::DEFAULT_SESSION_TTL_SECS;

/// Development client credentials, used when `OAUTH_CLIENT_*` are not set
const DEV_CLIENT_ID: &str = "warden-web";
const DEV_CLIENT_SECRET: &str = "warden-dev-secret";

/// Server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port (default: 3000)
    pub port: u16,
    /// Server host (default: 127.0.0.1)
    pub host: IpAddr,
    /// Allowed CORS origins, comma-separated (default: allow all in dev)
    pub allowed_origins: Option<Vec<String>>,
    /// Request body limit in KB (default: 64)
    pub body_limit_kb: usize,
    /// Request timeout in seconds (default: 30)
    pub timeout_secs: u64,
    /// Enable rate limiting (default: false for tests, true when loaded from env)
    pub rate_limit_enabled: bool,
    /// Rate limit: requests per second (default: 10)
    pub rate_limit_per_sec: u64,
    /// Rate limit: burst size (default: 20)
    pub rate_limit_burst: u32,
    /// PostgreSQL URL; the in-memory backend is used when unset
    pub database_url: Option<String>,
    /// Database connection pool maximum connections (default: 20)
    pub database_max_connections: u32,
    /// Access token lifetime in seconds (default: 3600)
    pub token_ttl_secs: u64,
    /// Registered OAuth2 client id
    pub oauth_client_id: String,
    /// Registered OAuth2 client secret
    pub oauth_client_secret: String,
    /// Account registered with this email is granted the admin role, but only while
    /// no account holds it yet
    pub admin_email: Option<String>,
    /// Argon2id cost parameters
    pub password_policy: PasswordPolicy,
    /// WebAuthn ceremony session lifetime in seconds (default: 300)
    pub session_ttl_secs: u64,
    /// Interval between expired session/token sweeps in seconds (default: 60)
    pub session_sweep_secs: u64,
    /// WebAuthn Relying Party ID (default: localhost)
    pub webauthn_rp_id: String,
    /// WebAuthn Relying Party display name (default: Warden)
    pub webauthn_rp_name: String,
    /// Origins allowed to run WebAuthn ceremonies (default: http://localhost:3000)
    pub webauthn_rp_origins: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            allowed_origins: None, // None = allow all (dev mode)
            body_limit_kb: 64,
            timeout_secs: 30,
            rate_limit_enabled: false, // Disabled by default (for tests)
            rate_limit_per_sec: 10,
            rate_limit_burst: 20,
            database_url: None,
            database_max_connections: 20,
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
            oauth_client_id: DEV_CLIENT_ID.to_string(),
            oauth_client_secret: DEV_CLIENT_SECRET.to_string(),
            admin_email: None,
            password_policy: PasswordPolicy::default(),
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
            session_sweep_secs: 60,
            webauthn_rp_id: "localhost".to_string(),
            webauthn_rp_name: "Warden".to_string(),
            webauthn_rp_origins: vec!["http://localhost:3000".to_string()],
        }
    }
}

/// Read and parse an environment variable, falling back to `default`
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Split a comma-separated list, dropping empty entries
fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let allowed_origins = std::env::var("ALLOWED_ORIGINS")
            .ok()
            .map(|origins| split_list(&origins));

        // Rate limiting enabled by default in production, can be disabled with RATE_LIMIT_ENABLED=false
        let rate_limit_enabled = std::env::var("RATE_LIMIT_ENABLED")
            .map(|v| v.to_lowercase() != "false")
            .unwrap_or(true);

        let oauth_client_id =
            std::env::var("OAUTH_CLIENT_ID").unwrap_or_else(|_| DEV_CLIENT_ID.to_string());
        let oauth_client_secret = std::env::var("OAUTH_CLIENT_SECRET").unwrap_or_else(|_| {
            tracing::warn!("OAUTH_CLIENT_SECRET not set, using the development secret");
            DEV_CLIENT_SECRET.to_string()
        });

        let password_policy = PasswordPolicy {
            memory_kib: env_or("ARGON2_MEMORY_KIB", defaults.password_policy.memory_kib),
            iterations: env_or("ARGON2_ITERATIONS", defaults.password_policy.iterations),
            parallelism: env_or("ARGON2_PARALLELISM", defaults.password_policy.parallelism),
        };

        let webauthn_rp_origins = std::env::var("WEBAUTHN_RP_ORIGINS")
            .ok()
            .map(|v| split_list(&v))
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.webauthn_rp_origins);

        Self {
            port: env_or("PORT", defaults.port),
            host: env_or("HOST", defaults.host),
            allowed_origins,
            body_limit_kb: env_or("BODY_LIMIT_KB", defaults.body_limit_kb),
            timeout_secs: env_or("REQUEST_TIMEOUT_SECS", defaults.timeout_secs),
            rate_limit_enabled,
            rate_limit_per_sec: env_or("RATE_LIMIT_PER_SEC", defaults.rate_limit_per_sec),
            rate_limit_burst: env_or("RATE_LIMIT_BURST", defaults.rate_limit_burst),
            database_url: std::env::var("DATABASE_URL").ok().filter(|v| !v.is_empty()),
            database_max_connections: env_or(
                "DATABASE_MAX_CONNECTIONS",
                defaults.database_max_connections,
            ),
            token_ttl_secs: env_or("TOKEN_TTL_SECS", defaults.token_ttl_secs),
            oauth_client_id,
            oauth_client_secret,
            admin_email: std::env::var("ADMIN_EMAIL").ok().filter(|v| !v.trim().is_empty()),
            password_policy,
            session_ttl_secs: env_or("SESSION_TTL_SECS", defaults.session_ttl_secs),
            session_sweep_secs: env_or("SESSION_SWEEP_SECS", defaults.session_sweep_secs).max(1),
            webauthn_rp_id: std::env::var("WEBAUTHN_RP_ID").unwrap_or(defaults.webauthn_rp_id),
            webauthn_rp_name: std::env::var("WEBAUTHN_RP_NAME")
                .unwrap_or(defaults.webauthn_rp_name),
            webauthn_rp_origins,
        }
    }

    /// Get socket address from config
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

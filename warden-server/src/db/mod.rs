//! Database module for Warden Server
//!
//! Contains entities, repositories, and database utilities.
//!
//! Every repository has two backends: PostgreSQL (production) and an in-process
//! `DashMap` (development and tests). The backend is picked once at startup and
//! injected through [`crate::state::AppState`].

pub mod account;
pub mod credential;
pub mod role;

pub use account::{Account, AccountRepository, AccountResponse, NewAccount};
pub use credential::{
    Attachment, Credential, CredentialRepository, CredentialSummary, SignCountOutcome,
};
pub use role::{Permission, Role, RoleRepository};

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Database migration error: {0}")]
    Migration(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        if is_unique_violation(&err) {
            Self::UniqueViolation(err.to_string())
        } else {
            Self::Query(err.to_string())
        }
    }
}

/// PostgreSQL reports unique constraint violations with SQLSTATE 23505.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

/// Connect to PostgreSQL and run pending migrations
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool, StorageError> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

    tracing::info!("Connected to PostgreSQL database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| StorageError::Migration(e.to_string()))?;

    tracing::info!("Database migrations completed");
    Ok(pool)
}

/// Check database connection health
pub async fn check_health(pool: &PgPool) -> Result<(), StorageError> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;
    Ok(())
}

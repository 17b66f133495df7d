//! Account entity and repository
//!
//! Accounts own the password hash used by the user directory. Emails are unique;
//! the memory backend enforces this through an email index updated under the
//! same shard lock as the insert.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use utoipa::ToSchema;
use uuid::Uuid;

use super::StorageError;

/// Account entity from database
#[derive(Debug, Clone, FromRow)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

/// DTO for inserting a new account
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub password_hash: String,
    pub display_name: String,
}

/// Account response DTO (excludes the password hash)
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AccountResponse {
    /// Account unique identifier
    #[schema(value_type = String, example = "550e8400-e29b-41d4-a716-446655440000")]
    pub id: Uuid,
    /// Account email address
    #[schema(example = "alice@example.com")]
    pub email: String,
    /// Display name
    #[schema(example = "Alice")]
    pub name: String,
    /// Account creation timestamp
    #[schema(value_type = String, example = "2026-01-08T10:00:00Z")]
    pub created_at: DateTime<Utc>,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            email: account.email,
            name: account.display_name,
            created_at: account.created_at,
        }
    }
}

#[derive(Default)]
struct MemoryAccounts {
    by_id: DashMap<Uuid, Account>,
    by_email: DashMap<String, Uuid>,
}

enum AccountBackend {
    Postgres(PgPool),
    Memory(MemoryAccounts),
}

/// Repository for account storage operations
pub struct AccountRepository {
    backend: AccountBackend,
}

impl AccountRepository {
    /// Create a repository backed by PostgreSQL
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            backend: AccountBackend::Postgres(pool),
        }
    }

    /// Create a repository backed by process memory
    pub fn in_memory() -> Self {
        Self {
            backend: AccountBackend::Memory(MemoryAccounts::default()),
        }
    }

    /// Insert a new account. Fails with `UniqueViolation` if the email is taken.
    pub async fn insert(&self, input: NewAccount) -> Result<Account, StorageError> {
        match &self.backend {
            AccountBackend::Postgres(pool) => {
                let account = sqlx::query_as::<_, Account>(
                    r#"
                    INSERT INTO accounts (id, email, password_hash, display_name)
                    VALUES ($1, $2, $3, $4)
                    RETURNING id, email, password_hash, display_name, created_at
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(&input.email)
                .bind(&input.password_hash)
                .bind(&input.display_name)
                .fetch_one(pool)
                .await?;
                Ok(account)
            }
            AccountBackend::Memory(mem) => match mem.by_email.entry(input.email.clone()) {
                Entry::Occupied(_) => Err(StorageError::UniqueViolation(format!(
                    "accounts.email = {}",
                    input.email
                ))),
                Entry::Vacant(slot) => {
                    let account = Account {
                        id: Uuid::new_v4(),
                        email: input.email,
                        password_hash: input.password_hash,
                        display_name: input.display_name,
                        created_at: Utc::now(),
                    };
                    mem.by_id.insert(account.id, account.clone());
                    slot.insert(account.id);
                    Ok(account)
                }
            },
        }
    }

    /// Find account by ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, StorageError> {
        match &self.backend {
            AccountBackend::Postgres(pool) => Ok(sqlx::query_as::<_, Account>(
                r#"
                SELECT id, email, password_hash, display_name, created_at
                FROM accounts
                WHERE id = $1
                "#,
            )
            .bind(id)
            .fetch_optional(pool)
            .await?),
            AccountBackend::Memory(mem) => Ok(mem.by_id.get(&id).map(|a| a.value().clone())),
        }
    }

    /// Find account by (normalized) email
    pub async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StorageError> {
        match &self.backend {
            AccountBackend::Postgres(pool) => Ok(sqlx::query_as::<_, Account>(
                r#"
                SELECT id, email, password_hash, display_name, created_at
                FROM accounts
                WHERE email = $1
                "#,
            )
            .bind(email)
            .fetch_optional(pool)
            .await?),
            AccountBackend::Memory(mem) => {
                let id = match mem.by_email.get(email) {
                    Some(id) => *id,
                    None => return Ok(None),
                };
                Ok(mem.by_id.get(&id).map(|a| a.value().clone()))
            }
        }
    }

    /// List all accounts, oldest first
    pub async fn list(&self) -> Result<Vec<Account>, StorageError> {
        match &self.backend {
            AccountBackend::Postgres(pool) => Ok(sqlx::query_as::<_, Account>(
                r#"
                SELECT id, email, password_hash, display_name, created_at
                FROM accounts
                ORDER BY created_at ASC
                "#,
            )
            .fetch_all(pool)
            .await?),
            AccountBackend::Memory(mem) => {
                let mut accounts: Vec<Account> =
                    mem.by_id.iter().map(|a| a.value().clone()).collect();
                accounts.sort_by_key(|a| a.created_at);
                Ok(accounts)
            }
        }
    }

    /// Update the display name; `None` if the account does not exist
    pub async fn update_display_name(
        &self,
        id: Uuid,
        display_name: &str,
    ) -> Result<Option<Account>, StorageError> {
        match &self.backend {
            AccountBackend::Postgres(pool) => Ok(sqlx::query_as::<_, Account>(
                r#"
                UPDATE accounts
                SET display_name = $2
                WHERE id = $1
                RETURNING id, email, password_hash, display_name, created_at
                "#,
            )
            .bind(id)
            .bind(display_name)
            .fetch_optional(pool)
            .await?),
            AccountBackend::Memory(mem) => Ok(mem.by_id.get_mut(&id).map(|mut entry| {
                entry.display_name = display_name.to_string();
                entry.value().clone()
            })),
        }
    }

    /// Delete an account. Credentials and role grants cascade in PostgreSQL;
    /// the memory backend relies on the caller to purge them.
    pub async fn delete(&self, id: Uuid) -> Result<bool, StorageError> {
        match &self.backend {
            AccountBackend::Postgres(pool) => {
                let result = sqlx::query("DELETE FROM accounts WHERE id = $1")
                    .bind(id)
                    .execute(pool)
                    .await?;
                Ok(result.rows_affected() > 0)
            }
            AccountBackend::Memory(mem) => match mem.by_id.remove(&id) {
                Some((_, account)) => {
                    mem.by_email.remove(&account.email);
                    Ok(true)
                }
                None => Ok(false),
            },
        }
    }
}

impl std::fmt::Debug for AccountRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let backend = match &self.backend {
            AccountBackend::Postgres(_) => "PostgreSQL",
            AccountBackend::Memory(_) => "Memory",
        };
        f.debug_struct("AccountRepository")
            .field("backend", &backend)
            .finish()
    }
}

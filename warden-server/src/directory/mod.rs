//! User directory
//!
//! Owns account records and password hashes. Password hashing is CPU bound and runs on
//! the blocking thread pool.

pub mod password;

pub use password::{PasswordHasher, PasswordPolicy};

use std::sync::Arc;

use uuid::Uuid;

use crate::db::{Account, AccountRepository, CredentialRepository, NewAccount, Role, RoleRepository, StorageError};

/// Password checked against unknown emails so both failure paths cost one verification
const DUMMY_PASSWORD: &str = "warden-dummy-password";

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("{0}")]
    Validation(String),

    #[error("Email already registered")]
    Conflict,

    #[error("Invalid credentials")]
    AuthFailed,

    #[error("Account not found")]
    NotFound,

    #[error("Password hashing error: {0}")]
    Hashing(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Lower-case and trim an email address
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Account directory backed by the account, role and credential repositories
pub struct UserDirectory {
    accounts: Arc<AccountRepository>,
    roles: Arc<RoleRepository>,
    credentials: Arc<CredentialRepository>,
    hasher: PasswordHasher,
    dummy_hash: String,
    admin_email: Option<String>,
}

impl UserDirectory {
    pub fn new(
        accounts: Arc<AccountRepository>,
        roles: Arc<RoleRepository>,
        credentials: Arc<CredentialRepository>,
        policy: PasswordPolicy,
        admin_email: Option<String>,
    ) -> Result<Self, DirectoryError> {
        let hasher = PasswordHasher::new(policy)?;
        let dummy_hash = hasher.hash(DUMMY_PASSWORD)?;
        Ok(Self {
            accounts,
            roles,
            credentials,
            hasher,
            dummy_hash,
            admin_email: admin_email
                .map(|e| normalize_email(&e))
                .filter(|e| !e.is_empty()),
        })
    }

    /// Register a new account and return its id
    pub async fn create_account(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<Uuid, DirectoryError> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(DirectoryError::Validation("Email is required".into()));
        }
        if !email.contains('@') {
            return Err(DirectoryError::Validation("Email address is invalid".into()));
        }
        if password.is_empty() {
            return Err(DirectoryError::Validation("Password is required".into()));
        }

        let display_name = match name.trim() {
            "" => email.split('@').next().unwrap_or_default().to_string(),
            name => name.to_string(),
        };

        let password_hash = self.hash_blocking(password.to_string()).await?;

        let account = self
            .accounts
            .insert(NewAccount {
                email: email.clone(),
                password_hash,
                display_name,
            })
            .await
            .map_err(|e| match e {
                StorageError::UniqueViolation(_) => DirectoryError::Conflict,
                other => DirectoryError::Storage(other),
            })?;

        if self.admin_email.as_deref() == Some(email.as_str()) {
            if self.roles.any_holder(Role::Admin).await? {
                tracing::warn!(
                    account_id = %account.id,
                    "Admin email registered but an admin already exists, role not granted"
                );
            } else {
                self.roles.grant(account.id, Role::Admin).await?;
            }
        }

        tracing::info!(account_id = %account.id, "Account created");
        Ok(account.id)
    }

    /// Check an email/password pair and return the account id
    ///
    /// Unknown email and wrong password both yield [`DirectoryError::AuthFailed`].
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<Uuid, DirectoryError> {
        let email = normalize_email(email);
        let account = if email.is_empty() {
            None
        } else {
            self.accounts.find_by_email(&email).await?
        };

        let (hash, account_id) = match account {
            Some(account) => (account.password_hash, Some(account.id)),
            None => (self.dummy_hash.clone(), None),
        };

        let verified = self.verify_blocking(password.to_string(), hash).await?;

        match (verified, account_id) {
            (true, Some(id)) => Ok(id),
            _ => {
                tracing::debug!("Password authentication failed");
                Err(DirectoryError::AuthFailed)
            }
        }
    }

    pub async fn get(&self, id: Uuid) -> Result<Account, DirectoryError> {
        self.accounts
            .find_by_id(id)
            .await?
            .ok_or(DirectoryError::NotFound)
    }

    pub async fn list(&self) -> Result<Vec<Account>, DirectoryError> {
        Ok(self.accounts.list().await?)
    }

    pub async fn update_display_name(&self, id: Uuid, name: &str) -> Result<Account, DirectoryError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DirectoryError::Validation("Name is required".into()));
        }
        let account = self
            .accounts
            .update_display_name(id, name)
            .await?
            .ok_or(DirectoryError::NotFound)?;

        tracing::info!(account_id = %id, "Display name updated");
        Ok(account)
    }

    /// Delete an account together with its credentials and role grants
    pub async fn delete(&self, id: Uuid) -> Result<(), DirectoryError> {
        if !self.accounts.delete(id).await? {
            return Err(DirectoryError::NotFound);
        }
        self.credentials.delete_for_account(id).await?;
        self.roles.revoke_all(id).await?;

        tracing::info!(account_id = %id, "Account deleted");
        Ok(())
    }

    pub async fn is_admin(&self, id: Uuid) -> Result<bool, DirectoryError> {
        Ok(self.roles.has_role(id, Role::Admin).await?)
    }

    async fn hash_blocking(&self, password: String) -> Result<String, DirectoryError> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| DirectoryError::Hashing(format!("Hashing task failed: {e}")))?
    }

    async fn verify_blocking(&self, password: String, hash: String) -> Result<bool, DirectoryError> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| DirectoryError::Hashing(format!("Verification task failed: {e}")))?
    }
}

impl std::fmt::Debug for UserDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserDirectory")
            .field("accounts", &self.accounts)
            .field("hasher", &self.hasher)
            .field("admin_email", &self.admin_email)
            .finish()
    }
}

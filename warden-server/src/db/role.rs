//! Roles, permissions and the account -> role table
//!
//! Every account implicitly holds [`Role::User`]. [`Role::Admin`] is an explicit grant
//! stored in `account_roles`.

use std::collections::BTreeSet;

use dashmap::DashMap;
use serde::Serialize;
use sqlx::PgPool;
use utoipa::ToSchema;
use uuid::Uuid;

use super::StorageError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, ToSchema)]
pub enum Permission {
    #[serde(rename = "users:read")]
    UsersRead,
    #[serde(rename = "users:delete")]
    UsersDelete,
    #[serde(rename = "roles:read")]
    RolesRead,
    #[serde(rename = "permissions:read")]
    PermissionsRead,
    #[serde(rename = "profile:read")]
    ProfileRead,
    #[serde(rename = "profile:write")]
    ProfileWrite,
    #[serde(rename = "webauthn:register")]
    WebauthnRegister,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Admin, Role::User];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "admin" => Some(Self::Admin),
            "user" => Some(Self::User),
            _ => None,
        }
    }

    /// Static role -> permission table
    pub fn permissions(&self) -> &'static [Permission] {
        match self {
            Self::Admin => &[
                Permission::UsersRead,
                Permission::UsersDelete,
                Permission::RolesRead,
                Permission::PermissionsRead,
                Permission::ProfileRead,
                Permission::ProfileWrite,
                Permission::WebauthnRegister,
            ],
            Self::User => &[
                Permission::ProfileRead,
                Permission::ProfileWrite,
                Permission::WebauthnRegister,
            ],
        }
    }
}

impl Permission {
    pub const ALL: [Permission; 7] = [
        Permission::UsersRead,
        Permission::UsersDelete,
        Permission::RolesRead,
        Permission::PermissionsRead,
        Permission::ProfileRead,
        Permission::ProfileWrite,
        Permission::WebauthnRegister,
    ];
}

enum RoleBackend {
    Postgres(PgPool),
    Memory(DashMap<Uuid, BTreeSet<Role>>),
}

/// Repository for explicit role grants
pub struct RoleRepository {
    backend: RoleBackend,
}

impl RoleRepository {
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            backend: RoleBackend::Postgres(pool),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            backend: RoleBackend::Memory(DashMap::new()),
        }
    }

    /// Grant a role (idempotent)
    pub async fn grant(&self, account_id: Uuid, role: Role) -> Result<(), StorageError> {
        match &self.backend {
            RoleBackend::Postgres(pool) => {
                sqlx::query(
                    r#"
                    INSERT INTO account_roles (account_id, role)
                    VALUES ($1, $2)
                    ON CONFLICT (account_id, role) DO NOTHING
                    "#,
                )
                .bind(account_id)
                .bind(role.as_str())
                .execute(pool)
                .await?;
            }
            RoleBackend::Memory(map) => {
                map.entry(account_id).or_default().insert(role);
            }
        }
        tracing::info!(account_id = %account_id, role = role.as_str(), "Role granted");
        Ok(())
    }

    /// Roles held by an account, including the implicit `user` role
    pub async fn roles_for(&self, account_id: Uuid) -> Result<BTreeSet<Role>, StorageError> {
        let mut roles: BTreeSet<Role> = match &self.backend {
            RoleBackend::Postgres(pool) => {
                let names: Vec<String> =
                    sqlx::query_scalar("SELECT role FROM account_roles WHERE account_id = $1")
                        .bind(account_id)
                        .fetch_all(pool)
                        .await?;
                names.iter().filter_map(|n| Role::parse(n)).collect()
            }
            RoleBackend::Memory(map) => map
                .get(&account_id)
                .map(|roles| roles.clone())
                .unwrap_or_default(),
        };
        roles.insert(Role::User);
        Ok(roles)
    }

    pub async fn has_role(&self, account_id: Uuid, role: Role) -> Result<bool, StorageError> {
        Ok(self.roles_for(account_id).await?.contains(&role))
    }

    /// Whether any account holds an explicit grant of `role`
    pub async fn any_holder(&self, role: Role) -> Result<bool, StorageError> {
        match &self.backend {
            RoleBackend::Postgres(pool) => {
                let exists: bool = sqlx::query_scalar(
                    "SELECT EXISTS (SELECT 1 FROM account_roles WHERE role = $1)",
                )
                .bind(role.as_str())
                .fetch_one(pool)
                .await?;
                Ok(exists)
            }
            RoleBackend::Memory(map) => Ok(map.iter().any(|entry| entry.value().contains(&role))),
        }
    }

    /// Drop every explicit grant of an account
    pub async fn revoke_all(&self, account_id: Uuid) -> Result<(), StorageError> {
        match &self.backend {
            RoleBackend::Postgres(pool) => {
                sqlx::query("DELETE FROM account_roles WHERE account_id = $1")
                    .bind(account_id)
                    .execute(pool)
                    .await?;
            }
            RoleBackend::Memory(map) => {
                map.remove(&account_id);
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for RoleRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let backend = match &self.backend {
            RoleBackend::Postgres(_) => "PostgreSQL",
            RoleBackend::Memory(_) => "Memory",
        };
        f.debug_struct("RoleRepository")
            .field("backend", &backend)
            .finish()
    }
}

//! User and hospital directory seams
//!
//! Both directories belong to external collaborators; this subsystem only
//! needs id-keyed lookups and role-filtered listings, expressed as traits so
//! the fan-out path can be exercised against in-memory fixtures.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Hospital, Role, UserRecord};

/// Role lookup by id and role-filtered listing
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Look up one user
    async fn get(&self, id: Uuid) -> Result<Option<UserRecord>>;

    /// List every user
    async fn list_all(&self) -> Result<Vec<UserRecord>>;

    /// List users whose role matches any of the given roles
    async fn list_by_roles(&self, roles: &[Role]) -> Result<Vec<UserRecord>>;
}

/// Existence check and name projection by id
#[async_trait]
pub trait HospitalDirectory: Send + Sync {
    /// Look up one hospital
    async fn get(&self, id: Uuid) -> Result<Option<Hospital>>;
}

/// Postgres-backed user directory
#[derive(Clone)]
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    /// Create a new Postgres-backed user directory
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn get(&self, id: Uuid) -> Result<Option<UserRecord>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT id, name, role FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.and_then(UserRow::into_record))
    }

    async fn list_all(&self) -> Result<Vec<UserRecord>> {
        let rows = sqlx::query_as::<_, UserRow>("SELECT id, name, role FROM users")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().filter_map(UserRow::into_record).collect())
    }

    async fn list_by_roles(&self, roles: &[Role]) -> Result<Vec<UserRecord>> {
        let role_strs: Vec<&str> = roles.iter().map(|r| r.as_str()).collect();

        let rows = sqlx::query_as::<_, UserRow>(
            "SELECT id, name, role FROM users WHERE role = ANY($1)",
        )
        .bind(&role_strs)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().filter_map(UserRow::into_record).collect())
    }
}

/// Postgres-backed hospital directory
#[derive(Clone)]
pub struct PgHospitalDirectory {
    pool: PgPool,
}

impl PgHospitalDirectory {
    /// Create a new Postgres-backed hospital directory
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HospitalDirectory for PgHospitalDirectory {
    async fn get(&self, id: Uuid) -> Result<Option<Hospital>> {
        let row = sqlx::query_as::<_, HospitalRow>("SELECT id, name FROM hospitals WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| Hospital {
            id: r.id,
            name: r.name,
        }))
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    role: String,
}

impl UserRow {
    /// Users with unrecognized roles are dropped rather than misclassified.
    fn into_record(self) -> Option<UserRecord> {
        let role = self.role.parse().ok()?;
        Some(UserRecord {
            id: self.id,
            name: self.name,
            role,
        })
    }
}

#[derive(sqlx::FromRow)]
struct HospitalRow {
    id: Uuid,
    name: String,
}

/// In-memory directory fixture for unit tests
#[cfg(test)]
#[derive(Default)]
pub struct MemoryDirectory {
    users: Vec<UserRecord>,
}

#[cfg(test)]
impl MemoryDirectory {
    pub fn with_users(users: Vec<UserRecord>) -> Self {
        Self { users }
    }
}

#[cfg(test)]
#[async_trait]
impl UserDirectory for MemoryDirectory {
    async fn get(&self, id: Uuid) -> Result<Option<UserRecord>> {
        Ok(self.users.iter().find(|u| u.id == id).cloned())
    }

    async fn list_all(&self) -> Result<Vec<UserRecord>> {
        Ok(self.users.clone())
    }

    async fn list_by_roles(&self, roles: &[Role]) -> Result<Vec<UserRecord>> {
        Ok(self
            .users
            .iter()
            .filter(|u| roles.contains(&u.role))
            .cloned()
            .collect())
    }
}


//! Database layer for EpiWatch
//!
//! PostgreSQL storage for outbreaks, alerts, the read-state ledger, and
//! per-user notifications, plus the external directory seams.

mod alerts;
mod directory;
mod notifications;
mod outbreaks;
mod postgres;

pub use alerts::AlertRepository;
pub use directory::{HospitalDirectory, PgHospitalDirectory, PgUserDirectory, UserDirectory};
pub use notifications::NotificationRepository;
pub use outbreaks::OutbreakRepository;
pub use postgres::PostgresPool;

#[cfg(test)]
pub(crate) use directory::MemoryDirectory;

use crate::config::Config;
use crate::error::Result;

/// Database connections bundle
#[derive(Clone)]
pub struct Database {
    /// PostgreSQL connection pool
    pub postgres: PostgresPool,
}

impl Database {
    /// Create a new database connection bundle
    pub async fn new(config: &Config) -> Result<Self> {
        let postgres = PostgresPool::new(&config.database).await?;

        Ok(Self { postgres })
    }

    /// Run database migrations
    pub async fn migrate(&self) -> Result<()> {
        self.postgres.migrate().await
    }

    /// Check database health
    pub async fn health_check(&self) -> Result<()> {
        self.postgres.health_check().await
    }
}

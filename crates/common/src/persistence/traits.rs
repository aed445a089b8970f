//! # Persistence Traits
//!
//! Core traits for database lifecycle management. Entity-level contracts live
//! with the crates that own the entities.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::PersistenceError;

/// Database connection abstraction
#[async_trait]
pub trait DatabaseConnection {
    /// Execute a health check
    async fn health_check(&self) -> Result<(), PersistenceError>;

    /// Close the connection
    async fn close(&self);

    /// Get connection pool statistics if available
    async fn connection_stats(&self) -> Result<Option<ConnectionStats>, PersistenceError> {
        Ok(None)
    }
}

/// Migration manager
#[async_trait]
pub trait MigrationManager {
    /// Run all pending migrations, returning how many were applied
    async fn run_migrations(&self) -> Result<usize, PersistenceError>;

    /// Get current schema version (0 when nothing is applied)
    async fn get_current_version(&self) -> Result<i64, PersistenceError>;

    /// Check migration status
    async fn migration_status(&self) -> Result<MigrationStatus, PersistenceError>;
}

/// A single versioned schema change
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    /// Strictly increasing version number
    pub version: i64,
    /// Short human-readable name, recorded in `_migrations`
    pub name: &'static str,
    /// SQL to execute; may contain several statements
    pub sql: &'static str,
}

/// Connection pool statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionStats {
    pub active_connections: u32,
    pub idle_connections: u32,
    pub max_connections: u32,
}

/// Migration status information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationStatus {
    pub current_version: i64,
    pub latest_version: i64,
    pub pending_migrations: Vec<String>,
    pub applied_migrations: Vec<String>,
}

impl MigrationStatus {
    /// True when every known migration has been applied
    pub fn is_up_to_date(&self) -> bool {
        self.pending_migrations.is_empty()
    }
}

//! SQLite persistence layer
//!
//! Connection pool construction, pragmas, health checks and a small versioned
//! migration runner shared by every SQLite-backed store.

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, error, info};

use super::traits::{
    ConnectionStats, DatabaseConnection, Migration, MigrationStatus,
};
use crate::config::DatabaseConfig;
use crate::error::PersistenceError;

/// SQLite connection wrapper
#[derive(Debug, Clone)]
pub struct SqliteConnection {
    pool: SqlitePool,
}

impl SqliteConnection {
    /// Create new connection pool from configuration
    pub async fn new(config: &DatabaseConfig) -> Result<Self, PersistenceError> {
        info!("Initializing SQLite connection with URL: {}", config.url);

        let mut options = SqliteConnectOptions::from_str(&config.url)
            .map_err(PersistenceError::connection_failed)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(30));

        if !config.url.contains(":memory:") {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(config.idle_timeout)
            .max_lifetime(config.max_lifetime)
            .connect_with(options)
            .await
            .map_err(PersistenceError::connection_failed)?;

        info!(
            "SQLite connection pool established with {} max connections",
            config.max_connections
        );

        Ok(Self { pool })
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn ensure_migrations_table(&self) -> Result<(), PersistenceError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| PersistenceError::MigrationFailed {
            details: format!("Failed to create migrations table: {e}"),
        })?;
        Ok(())
    }

    /// Apply every migration newer than the recorded schema version
    ///
    /// Each migration runs in its own transaction together with its
    /// `_migrations` bookkeeping row.
    pub async fn apply_migrations(
        &self,
        migrations: &[Migration],
    ) -> Result<usize, PersistenceError> {
        self.ensure_migrations_table().await?;
        let current = self.current_version().await?;

        let mut pending: Vec<&Migration> =
            migrations.iter().filter(|m| m.version > current).collect();
        pending.sort_by_key(|m| m.version);

        for migration in &pending {
            info!(
                "Applying migration {} ({})",
                migration.version, migration.name
            );

            let mut tx = self.pool.begin().await.map_err(|e| {
                PersistenceError::TransactionFailed {
                    details: e.to_string(),
                }
            })?;

            sqlx::query(migration.sql)
                .execute(&mut *tx)
                .await
                .map_err(|e| PersistenceError::MigrationFailed {
                    details: format!("{} failed: {e}", migration.name),
                })?;

            sqlx::query("INSERT INTO _migrations (version, name) VALUES (?, ?)")
                .bind(migration.version)
                .bind(migration.name)
                .execute(&mut *tx)
                .await
                .map_err(|e| PersistenceError::MigrationFailed {
                    details: format!("Failed to record {}: {e}", migration.name),
                })?;

            tx.commit()
                .await
                .map_err(|e| PersistenceError::TransactionFailed {
                    details: e.to_string(),
                })?;
        }

        if pending.is_empty() {
            debug!("Schema is up to date at version {}", current);
        }
        Ok(pending.len())
    }

    /// Highest applied migration version, 0 when none
    pub async fn current_version(&self) -> Result<i64, PersistenceError> {
        self.ensure_migrations_table().await?;
        let version: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM _migrations")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| PersistenceError::query_failed("SELECT MAX(version)", e))?;
        Ok(version.unwrap_or(0))
    }

    /// Status of `migrations` against what has been recorded
    pub async fn migration_status(
        &self,
        migrations: &[Migration],
    ) -> Result<MigrationStatus, PersistenceError> {
        let current_version = self.current_version().await?;
        let applied_migrations: Vec<String> =
            sqlx::query_scalar("SELECT name FROM _migrations ORDER BY version")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| PersistenceError::query_failed("SELECT name FROM _migrations", e))?;

        let pending_migrations = migrations
            .iter()
            .filter(|m| m.version > current_version)
            .map(|m| m.name.to_string())
            .collect();

        Ok(MigrationStatus {
            current_version,
            latest_version: migrations.iter().map(|m| m.version).max().unwrap_or(0),
            pending_migrations,
            applied_migrations,
        })
    }
}

#[async_trait]
impl DatabaseConnection for SqliteConnection {
    async fn health_check(&self) -> Result<(), PersistenceError> {
        debug!("Running SQLite health check");

        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| PersistenceError::query_failed("SELECT 1", e))?;

        let integrity: String = sqlx::query_scalar("PRAGMA integrity_check(10)")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| PersistenceError::query_failed("PRAGMA integrity_check", e))?;

        if integrity != "ok" {
            error!("Database integrity check failed: {}", integrity);
            return Err(PersistenceError::DeserializationFailed {
                details: format!("Database integrity compromised: {integrity}"),
            });
        }

        Ok(())
    }

    async fn close(&self) {
        info!("Closing SQLite connection pool");
        self.pool.close().await;
    }

    async fn connection_stats(&self) -> Result<Option<ConnectionStats>, PersistenceError> {
        let pool_size = self.pool.size();
        let idle_size = self.pool.num_idle() as u32;

        Ok(Some(ConnectionStats {
            active_connections: pool_size.saturating_sub(idle_size),
            idle_connections: idle_size,
            max_connections: self.pool.options().get_max_connections(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIGRATIONS: &[Migration] = &[
        Migration {
            version: 1,
            name: "create_widgets",
            sql: "CREATE TABLE widgets (id INTEGER PRIMARY KEY, name TEXT NOT NULL UNIQUE);",
        },
        Migration {
            version: 2,
            name: "add_widget_color",
            sql: "ALTER TABLE widgets ADD COLUMN color TEXT; \
                  CREATE INDEX idx_widgets_color ON widgets(color);",
        },
    ];

    #[tokio::test]
    async fn test_connection_health() {
        let conn = SqliteConnection::new(&DatabaseConfig::in_memory())
            .await
            .unwrap();
        assert!(conn.health_check().await.is_ok());

        let stats = conn.connection_stats().await.unwrap().unwrap();
        assert_eq!(stats.max_connections, 10);
    }

    #[tokio::test]
    async fn test_migrations_apply_once() {
        let conn = SqliteConnection::new(&DatabaseConfig::in_memory())
            .await
            .unwrap();

        assert_eq!(conn.current_version().await.unwrap(), 0);
        assert_eq!(conn.apply_migrations(MIGRATIONS).await.unwrap(), 2);
        assert_eq!(conn.apply_migrations(MIGRATIONS).await.unwrap(), 0);
        assert_eq!(conn.current_version().await.unwrap(), 2);

        let status = conn.migration_status(MIGRATIONS).await.unwrap();
        assert!(status.is_up_to_date());
        assert_eq!(
            status.applied_migrations,
            vec!["create_widgets".to_string(), "add_widget_color".to_string()]
        );

        // Schema from both migrations is usable
        sqlx::query("INSERT INTO widgets (name, color) VALUES ('a', 'red')")
            .execute(conn.pool())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_unique_violation_maps_to_constraint() {
        let conn = SqliteConnection::new(&DatabaseConfig::in_memory())
            .await
            .unwrap();
        conn.apply_migrations(MIGRATIONS).await.unwrap();

        let insert = "INSERT INTO widgets (name) VALUES ('dup')";
        sqlx::query(insert).execute(conn.pool()).await.unwrap();
        let err = sqlx::query(insert).execute(conn.pool()).await.unwrap_err();

        assert!(PersistenceError::from_sqlx(insert, err).is_constraint_violation());
    }

    #[tokio::test]
    async fn test_failed_migration_is_not_recorded() {
        let conn = SqliteConnection::new(&DatabaseConfig::in_memory())
            .await
            .unwrap();

        let broken = [Migration {
            version: 1,
            name: "broken",
            sql: "CREATE TABLE oops (",
        }];
        assert!(matches!(
            conn.apply_migrations(&broken).await,
            Err(PersistenceError::MigrationFailed { .. })
        ));
        assert_eq!(conn.current_version().await.unwrap(), 0);
    }
}

//! # Configuration Types
//!
//! Configuration structures shared by every bastion component.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{BastionError, ConfigurationError};

/// Database configuration shared across all crates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,

    /// Connection timeout
    pub connect_timeout: Duration,

    /// Idle timeout for connections
    pub idle_timeout: Option<Duration>,

    /// Maximum lifetime for connections
    pub max_lifetime: Option<Duration>,

    /// Whether to run migrations on startup
    pub run_migrations: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(600)),
            max_lifetime: Some(Duration::from_secs(3600)),
            run_migrations: true,
        }
    }
}

impl DatabaseConfig {
    /// In-memory configuration, handy for tests and dry runs
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Configuration for an on-disk SQLite database
    pub fn sqlite_file(path: impl Into<PathBuf>) -> Self {
        Self {
            url: format!("sqlite://{}", path.into().display()),
            ..Self::default()
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty, compact)
    pub format: String,

    /// Whether to also forward events to systemd-journald when reachable
    pub journald: bool,

    /// Additional log targets and their levels
    pub targets: HashMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            journald: true,
            targets: HashMap::new(),
        }
    }
}

impl LoggingConfig {
    /// Build the `EnvFilter` directive string: base level plus per-target levels
    pub fn filter_directives(&self) -> String {
        let mut targets: Vec<_> = self.targets.iter().collect();
        targets.sort();

        std::iter::once(self.level.clone())
            .chain(
                targets
                    .into_iter()
                    .map(|(target, level)| format!("{target}={level}")),
            )
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Common configuration validation trait
pub trait ConfigValidation {
    type Error: BastionError;

    /// Validate the configuration
    fn validate(&self) -> Result<(), Self::Error>;

    /// Get configuration warnings (non-fatal issues)
    fn warnings(&self) -> Vec<String> {
        Vec::new()
    }
}

impl ConfigValidation for DatabaseConfig {
    type Error = ConfigurationError;

    fn validate(&self) -> Result<(), Self::Error> {
        if self.url.is_empty() {
            return Err(ConfigurationError::InvalidValue {
                key: "url".to_string(),
                value: self.url.clone(),
                reason: "Database URL cannot be empty".to_string(),
            });
        }

        if !self.url.starts_with("sqlite:") {
            return Err(ConfigurationError::InvalidValue {
                key: "url".to_string(),
                value: self.url.clone(),
                reason: "Only sqlite: URLs are supported".to_string(),
            });
        }

        if self.max_connections == 0 {
            return Err(ConfigurationError::InvalidValue {
                key: "max_connections".to_string(),
                value: self.max_connections.to_string(),
                reason: "Max connections must be greater than 0".to_string(),
            });
        }

        if self.min_connections > self.max_connections {
            return Err(ConfigurationError::InvalidValue {
                key: "min_connections".to_string(),
                value: self.min_connections.to_string(),
                reason: "Min connections cannot be greater than max connections".to_string(),
            });
        }

        Ok(())
    }

    fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.url.contains(":memory:") {
            warnings.push("Database is in-memory; directory data is lost on exit".to_string());
        }
        if !self.run_migrations {
            warnings.push("Migrations are disabled; the schema must already exist".to_string());
        }
        warnings
    }
}

impl ConfigValidation for LoggingConfig {
    type Error = ConfigurationError;

    fn validate(&self) -> Result<(), Self::Error> {
        const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
        const FORMATS: [&str; 3] = ["pretty", "compact", "json"];

        if !LEVELS.contains(&self.level.to_lowercase().as_str()) {
            return Err(ConfigurationError::InvalidValue {
                key: "logging.level".to_string(),
                value: self.level.clone(),
                reason: format!("Expected one of: {}", LEVELS.join(", ")),
            });
        }

        if !FORMATS.contains(&self.format.to_lowercase().as_str()) {
            return Err(ConfigurationError::InvalidValue {
                key: "logging.format".to_string(),
                value: self.format.clone(),
                reason: format!("Expected one of: {}", FORMATS.join(", ")),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_config_default() {
        let config = DatabaseConfig::default();
        assert_eq!(config.url, "sqlite::memory:");
        assert_eq!(config.max_connections, 10);
        assert!(config.run_migrations);
        assert!(config.validate().is_ok());
        assert_eq!(config.warnings().len(), 1);
    }

    #[test]
    fn test_database_config_validation() {
        let mut config = DatabaseConfig {
            url: String::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.url = "postgres://localhost/bastion".to_string();
        assert!(config.validate().is_err());

        config.url = "sqlite://bastion.db".to_string();
        config.min_connections = 20;
        assert!(config.validate().is_err());

        config.min_connections = 1;
        assert!(config.validate().is_ok());
        assert!(config.warnings().is_empty());
    }

    #[test]
    fn test_sqlite_file_url() {
        let config = DatabaseConfig::sqlite_file("/var/lib/bastion/directory.db");
        assert_eq!(config.url, "sqlite:///var/lib/bastion/directory.db");
    }

    #[test]
    fn test_logging_filter_directives() {
        let mut config = LoggingConfig::default();
        assert_eq!(config.filter_directives(), "info");

        config.targets.insert("sqlx".to_string(), "warn".to_string());
        config
            .targets
            .insert("directory".to_string(), "debug".to_string());
        assert_eq!(config.filter_directives(), "info,directory=debug,sqlx=warn");
    }

    #[test]
    fn test_logging_config_validation() {
        let mut config = LoggingConfig::default();
        assert!(config.validate().is_ok());

        config.level = "verbose".to_string();
        assert!(config.validate().is_err());

        config.level = "DEBUG".to_string();
        config.format = "xml".to_string();
        assert!(config.validate().is_err());
    }
}

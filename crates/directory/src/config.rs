//! # Directory Configuration
//!
//! Layered through `common::config::loader`: compiled defaults, then a TOML
//! file, then `BASTION_*` environment variables.

use common::config::{
    load_config_with_options, ConfigValidation, DatabaseConfig, LoadOptions, LoggingConfig,
};
use common::error::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::resolver::DEFAULT_SSH_PORT;

/// Top-level configuration for the directory service and `directoryctl`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub directory: DirectorySettings,
}

/// Resolver behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectorySettings {
    /// Port appended to addresses given without one
    pub default_port: u16,

    /// Seed the demo hosts at startup
    pub seed_demo: bool,
}

impl Default for DirectorySettings {
    fn default() -> Self {
        Self {
            default_port: DEFAULT_SSH_PORT,
            seed_demo: false,
        }
    }
}

impl DirectoryConfig {
    /// Load from `path` (or the default search locations) and validate
    pub fn load(path: Option<PathBuf>) -> Result<Self, ConfigurationError> {
        let require_file = path.is_some();
        let config: Self = load_config_with_options(LoadOptions {
            config_path: path,
            require_file,
            ..LoadOptions::default()
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Render the compiled defaults as TOML
    pub fn sample_toml() -> Result<String, ConfigurationError> {
        toml::to_string_pretty(&Self::default()).map_err(|e| ConfigurationError::ParseError {
            details: e.to_string(),
        })
    }
}

impl ConfigValidation for DirectoryConfig {
    type Error = ConfigurationError;

    fn validate(&self) -> Result<(), Self::Error> {
        self.database.validate()?;
        self.logging.validate()?;

        if self.directory.default_port == 0 {
            return Err(ConfigurationError::InvalidValue {
                key: "directory.default_port".to_string(),
                value: "0".to_string(),
                reason: "Default port must be non-zero".to_string(),
            });
        }

        Ok(())
    }

    fn warnings(&self) -> Vec<String> {
        let mut warnings = self.database.warnings();
        warnings.extend(self.logging.warnings());
        if self.directory.seed_demo {
            warnings.push("Demo hosts will be seeded into the directory".to_string());
        }
        warnings
    }
}

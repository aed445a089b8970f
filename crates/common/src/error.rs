//! Error handling for the bastion directory
//!
//! This module defines the shared error infrastructure:
//! - `BastionError` marker trait for consistent error handling
//! - Specific error types for configuration, persistence and validation
//! - Integration with `thiserror` for ergonomic error handling
//!
//! # Design Principles
//! - All errors implement Send + Sync for async compatibility
//! - Use thiserror for library errors, anyhow for application errors
//! - Provide clear, actionable error messages

use thiserror::Error;

/// Base trait for all bastion-specific errors
///
/// Ensures every error is thread-safe, owns its data and implements the
/// standard `Error` trait. New error types derive `thiserror::Error`,
/// implement this trait and use `#[from]` for conversions from underlying
/// errors.
pub trait BastionError: std::error::Error + Send + Sync + 'static {}

/// Configuration-related errors
///
/// These errors occur during configuration loading, parsing, or validation.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    /// Configuration file cannot be read
    #[error("Cannot read configuration file {path}: {source}")]
    ReadError {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Configuration parsing failed
    #[error("Failed to parse configuration: {details}")]
    ParseError { details: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for {key}: {value} ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    /// Missing required configuration
    #[error("Missing required configuration: {key}")]
    MissingRequired { key: String },

    /// Environment variable error
    #[error("Environment variable error for {var}: {details}")]
    EnvironmentError { var: String, details: String },

    /// Configuration validation failed
    #[error("Configuration validation failed: {details}")]
    ValidationFailed { details: String },
}

impl BastionError for ConfigurationError {}

/// Database and persistence-related errors
///
/// Store collaborators report every failure through this type. The directory
/// core passes these through to its callers untouched.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// Database connection failed
    #[error("Database connection failed: {source}")]
    ConnectionFailed {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Database query failed
    #[error("Database query failed: {query}: {details}")]
    QueryFailed { query: String, details: String },

    /// Database transaction failed
    #[error("Database transaction failed: {details}")]
    TransactionFailed { details: String },

    /// Database migration failed
    #[error("Database migration failed: {details}")]
    MigrationFailed { details: String },

    /// Stored data could not be decoded
    #[error("Deserialization failed: {details}")]
    DeserializationFailed { details: String },

    /// Constraint violation
    #[error("Database constraint violation: {constraint}")]
    ConstraintViolation { constraint: String },

    /// Record not found
    #[error("Record not found: {details}")]
    NotFound { details: String },
}

impl BastionError for PersistenceError {}

/// Validation errors
///
/// These errors occur during input validation or data format checking.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Invalid input format
    #[error("Invalid {field} format: {value}")]
    InvalidFormat { field: String, value: String },

    /// Value out of range
    #[error("{field} value {value} is out of range [{min}, {max}]")]
    OutOfRange {
        field: String,
        value: String,
        min: String,
        max: String,
    },

    /// Required field missing
    #[error("Required field missing: {field}")]
    MissingField { field: String },

    /// Field constraint violation
    #[error("Field constraint violation for {field}: {constraint}")]
    ConstraintViolation { field: String, constraint: String },
}

impl BastionError for ValidationError {}

/// Result type alias for common bastion operations
pub type BastionResult<T, E = Box<dyn BastionError>> = Result<T, E>;

impl ConfigurationError {
    /// Create a validation failed error
    pub fn validation_failed(details: impl Into<String>) -> Self {
        Self::ValidationFailed {
            details: details.into(),
        }
    }
}

impl PersistenceError {
    /// Create a connection failed error from any error type
    pub fn connection_failed(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::ConnectionFailed {
            source: Box::new(source),
        }
    }

    /// Create a query failed error, keeping the driver message
    pub fn query_failed(query: impl Into<String>, details: impl std::fmt::Display) -> Self {
        Self::QueryFailed {
            query: query.into(),
            details: details.to_string(),
        }
    }

    /// Returns true when the error reports a uniqueness or foreign key violation
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, Self::ConstraintViolation { .. })
    }
}

#[cfg(feature = "sqlite")]
impl PersistenceError {
    /// Map a sqlx error, recognising constraint violations reported by the driver
    pub fn from_sqlx(query: impl Into<String>, err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() || db_err.is_foreign_key_violation() {
                return Self::ConstraintViolation {
                    constraint: db_err.message().to_string(),
                };
            }
        }
        Self::query_failed(query, err)
    }
}

//! # Common Bastion
//!
//! Shared error definitions, configuration loading, structured logging and
//! persistence plumbing for the Bastion crates.
//!
//! ## Key Features
//! - Error taxonomy with the BastionError marker trait
//! - Layered configuration (defaults, TOML file, environment)
//! - Journald-aware tracing initialization
//! - SQLite connection pool and versioned migrations (feature `sqlite`)

pub mod config;
pub mod error;
pub mod journal;
pub mod persistence;

// Re-export commonly used types at the crate root for convenience
pub use config::*;
pub use error::*;

pub use persistence::traits as persistence_traits;
pub use persistence::traits::*;

/// Version of the common crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! # Configuration Abstractions
//!
//! Common configuration patterns and database configuration shared across
//! all bastion components.

pub mod loader;
pub mod types;

// Re-export commonly used types
pub use loader::*;
pub use types::*;

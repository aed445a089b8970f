//! # Persistence Abstractions
//!
//! Connection lifecycle, health checks and migrations shared by the stores.

#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod traits;

// Re-export commonly used types
#[cfg(feature = "sqlite")]
pub use sqlite::*;
pub use traits::*;

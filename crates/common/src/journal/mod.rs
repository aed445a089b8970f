//! Simple journal system using tracing + journald
//!
//! Structured logging that integrates with systemd's journal for production
//! deployments and falls back to console logging for development.

pub mod init;
pub mod logging;

// Re-export public API
pub use init::init_journal;
pub use logging::*;

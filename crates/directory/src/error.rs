//! Directory error types

use common::error::{BastionError, PersistenceError};
use thiserror::Error;

use crate::entities::EntityKind;

/// Errors surfaced by the directory core
#[derive(Error, Debug)]
pub enum DirectoryError {
    /// Connection string could not be parsed into an address
    #[error("Malformed host address {input:?}: {reason}")]
    MalformedAddress { input: String, reason: String },

    /// No host matches the identity claimed by a session
    #[error("No such target: {0:?}")]
    NoSuchTarget(String),

    /// Single id-or-name lookup matched nothing
    #[error("{kind} not found: {query}")]
    NotFound { kind: EntityKind, query: String },

    /// A batch lookup stopped at the first item that matched nothing
    #[error("Batch resolution failed at item {index} ({query}): {source}")]
    BatchResolutionFailed {
        index: usize,
        query: String,
        #[source]
        source: Box<DirectoryError>,
    },

    /// Name rejected on the creation path
    #[error("Invalid {kind} name {name:?}: {reason}")]
    InvalidName {
        kind: EntityKind,
        name: String,
        reason: String,
    },

    /// Store failure, passed through untouched
    #[error(transparent)]
    Store(#[from] PersistenceError),
}

impl BastionError for DirectoryError {}

pub type DirectoryResult<T> = Result<T, DirectoryError>;

impl DirectoryError {
    pub fn not_found(kind: EntityKind, query: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            query: query.into(),
        }
    }

    pub fn malformed(input: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::MalformedAddress {
            input: input.into(),
            reason: reason.to_string(),
        }
    }

    /// True for lookup misses, including a miss inside a batch
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } | Self::NoSuchTarget(_) => true,
            Self::BatchResolutionFailed { source, .. } => source.is_not_found(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_batch_error_chain() {
        let err = DirectoryError::BatchResolutionFailed {
            index: 1,
            query: "sdg".to_string(),
            source: Box::new(DirectoryError::not_found(EntityKind::Host, "sdg")),
        };
        assert!(err.is_not_found());
        assert_eq!(
            err.to_string(),
            "Batch resolution failed at item 1 (sdg): host not found: sdg"
        );
        assert!(err.source().is_some());
    }

    #[test]
    fn test_store_error_is_transparent() {
        let err: DirectoryError =
            PersistenceError::query_failed("SELECT 1", "disk I/O error").into();
        assert!(!err.is_not_found());
        assert_eq!(
            err.to_string(),
            "Database query failed: SELECT 1: disk I/O error"
        );
    }

    #[test]
    fn test_no_such_target_display() {
        assert_eq!(
            DirectoryError::NoSuchTarget(String::new()).to_string(),
            "No such target: \"\""
        );
    }
}

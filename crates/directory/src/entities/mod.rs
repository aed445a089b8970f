//! # Directory Entities
//!
//! The four record kinds the directory manages and the traits the stores use
//! to handle them uniformly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{DirectoryError, DirectoryResult};

pub mod group;
pub mod host;
pub mod ssh_key;
pub mod user;

pub use group::{Group, NewGroup};
pub use host::{Host, NewHost};
pub use ssh_key::{NewSshKey, SshKey};
pub use user::{NewUser, User};

/// Minimum length of an entity name accepted on the creation path
pub const NAME_MIN_LEN: usize = 3;

/// Maximum length of an entity name accepted on the creation path
pub const NAME_MAX_LEN: usize = 64;

/// Store-assigned numeric identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub i64);

impl EntityId {
    pub fn value(self) -> i64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<i64> for EntityId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl FromStr for EntityId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

/// Kind of directory record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    User,
    SshKey,
    Host,
    Group,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::User => "user",
            EntityKind::SshKey => "ssh key",
            EntityKind::Host => "host",
            EntityKind::Group => "group",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted directory record
pub trait Entity: Clone + fmt::Debug + Send + Sync + 'static {
    /// Creation input for this record kind
    type Draft: EntityDraft;

    const KIND: EntityKind;

    fn id(&self) -> EntityId;

    fn name(&self) -> &str;

    /// Materialize a draft once the store has assigned an id
    fn from_draft(id: EntityId, draft: Self::Draft, now: DateTime<Utc>) -> Self;
}

/// Creation input for an entity, everything except the id and timestamps
pub trait EntityDraft: Clone + fmt::Debug + Send + Sync + 'static {
    fn name(&self) -> &str;
}

/// Check a name against the creation rule: 3 to 64 characters of
/// `[A-Za-z0-9._-]`
pub fn validate_name(kind: EntityKind, name: &str) -> DirectoryResult<()> {
    let invalid = |reason: String| DirectoryError::InvalidName {
        kind,
        name: name.to_string(),
        reason,
    };

    let len = name.chars().count();
    if !(NAME_MIN_LEN..=NAME_MAX_LEN).contains(&len) {
        return Err(invalid(format!(
            "must be between {NAME_MIN_LEN} and {NAME_MAX_LEN} characters, got {len}"
        )));
    }

    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
    {
        return Err(invalid(format!("character {c:?} is not allowed")));
    }

    Ok(())
}

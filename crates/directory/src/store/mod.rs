//! # Store Contract
//!
//! The directory core only talks to persistence through these traits.
//! [`SqliteStore`] and [`MemoryStore`] are the shipped implementations.

use async_trait::async_trait;
use common::error::PersistenceError;
use serde::{Deserialize, Serialize};

use crate::entities::{Entity, EntityId, Group, Host, SshKey, User};

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Lookup condition for [`EntityStore::find_one`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    NameEquals(String),
    IdEquals(EntityId),
    /// Id equal to the query parsed as an integer, or name equal to the query
    IdOrName(String),
}

impl Predicate {
    pub fn name(name: impl Into<String>) -> Self {
        Self::NameEquals(name.into())
    }

    pub fn id_or_name(query: impl Into<String>) -> Self {
        Self::IdOrName(query.into())
    }

    /// Evaluate the predicate against a record
    pub fn matches<E: Entity>(&self, entity: &E) -> bool {
        match self {
            Predicate::NameEquals(name) => entity.name() == name,
            Predicate::IdEquals(id) => entity.id() == *id,
            Predicate::IdOrName(query) => {
                query.parse::<i64>().ok() == Some(entity.id().0) || entity.name() == query
            }
        }
    }
}

/// Keyed store for one entity kind
#[async_trait]
pub trait EntityStore<E: Entity>: Send + Sync {
    /// Lowest-id record matching the predicate
    async fn find_one(&self, predicate: &Predicate) -> Result<Option<E>, PersistenceError>;

    /// Create a record, failing with `ConstraintViolation` on a name collision
    async fn create(&self, draft: E::Draft) -> Result<E, PersistenceError>;

    /// Hard delete; returns whether a record was removed
    async fn delete(&self, id: EntityId) -> Result<bool, PersistenceError>;

    /// All records ordered by id
    async fn list(&self) -> Result<Vec<E>, PersistenceError>;

    /// Return the record matching `predicate`, creating it from `defaults`
    /// when absent
    async fn find_or_create(
        &self,
        predicate: &Predicate,
        defaults: E::Draft,
    ) -> Result<E, PersistenceError> {
        if let Some(existing) = self.find_one(predicate).await? {
            return Ok(existing);
        }

        match self.create(defaults).await {
            Ok(created) => Ok(created),
            // Lost a race with a concurrent create of the same name
            Err(err) if err.is_constraint_violation() => {
                self.find_one(predicate).await?.ok_or(err)
            }
            Err(err) => Err(err),
        }
    }
}

/// Side of a group membership
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Member {
    User(EntityId),
    Host(EntityId),
}

impl Member {
    pub fn id(&self) -> EntityId {
        match self {
            Member::User(id) | Member::Host(id) => *id,
        }
    }

    pub fn kind_str(&self) -> &'static str {
        match self {
            Member::User(_) => "user",
            Member::Host(_) => "host",
        }
    }
}

/// Relations between records: group memberships and key ownership
#[async_trait]
pub trait RelationStore: Send + Sync {
    /// Returns true when the membership did not exist before
    async fn add_membership(
        &self,
        group: EntityId,
        member: Member,
    ) -> Result<bool, PersistenceError>;

    /// Returns true when a membership was removed
    async fn remove_membership(
        &self,
        group: EntityId,
        member: Member,
    ) -> Result<bool, PersistenceError>;

    /// Groups the member belongs to, ordered by id
    async fn groups_of(&self, member: Member) -> Result<Vec<Group>, PersistenceError>;

    /// Keys registered by the user, ordered by id
    async fn keys_owned_by(&self, user: EntityId) -> Result<Vec<SshKey>, PersistenceError>;
}

/// Everything the directory needs from a store
pub trait DirectoryStore:
    EntityStore<User> + EntityStore<SshKey> + EntityStore<Host> + EntityStore<Group> + RelationStore
{
}

impl<T> DirectoryStore for T where
    T: EntityStore<User>
        + EntityStore<SshKey>
        + EntityStore<Host>
        + EntityStore<Group>
        + RelationStore
        + ?Sized
{
}

pub(crate) fn unique_name_violation(table: &str) -> PersistenceError {
    PersistenceError::ConstraintViolation {
        constraint: format!("UNIQUE constraint failed: {table}.name"),
    }
}

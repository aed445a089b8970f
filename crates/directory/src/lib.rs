//! # Bastion Directory
//!
//! Resolves the identity an SSH session presents to the bastion into a fully
//! specified target host: address, login user, credential and expected
//! fingerprint. Also manages the users, keys, hosts and groups behind those
//! lookups.
//!
//! ## Layout
//! - [`address`]: connection string parsing
//! - [`entities`]: the four record kinds
//! - [`store`]: the persistence contract plus SQLite and in-memory stores
//! - [`resolver`]: lookups and administrative operations over a store
//! - [`cli`]: the `directoryctl` command set

pub mod address;
pub mod cli;
pub mod config;
pub mod entities;
pub mod error;
pub mod resolver;
pub mod seed;
pub mod store;

pub use address::HostAddress;
pub use config::{DirectoryConfig, DirectorySettings};
pub use entities::{
    Entity, EntityDraft, EntityId, EntityKind, Group, Host, NewGroup, NewHost, NewSshKey, NewUser,
    SshKey, User,
};
pub use error::{DirectoryError, DirectoryResult};
pub use resolver::{Directory, SessionIdentity, DEFAULT_SSH_PORT};
pub use store::{
    DirectoryStore, EntityStore, Member, MemoryStore, Predicate, RelationStore, SqliteStore,
};

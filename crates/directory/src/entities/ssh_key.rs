//! SSH key pairs used to authenticate outbound connections

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Entity, EntityDraft, EntityId, EntityKind};

/// Stored SSH key pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshKey {
    pub id: EntityId,
    pub name: String,
    /// Algorithm name, e.g. `ed25519` or `rsa`
    pub key_type: String,
    /// Key size in bits
    pub length: u32,
    pub fingerprint: String,
    #[serde(skip_serializing, default)]
    pub priv_key: String,
    pub pub_key: String,
    /// User that registered the key
    pub owner_id: Option<EntityId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for SshKey {
    type Draft = NewSshKey;

    const KIND: EntityKind = EntityKind::SshKey;

    fn id(&self) -> EntityId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn from_draft(id: EntityId, draft: NewSshKey, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: draft.name,
            key_type: draft.key_type,
            length: draft.length,
            fingerprint: draft.fingerprint,
            priv_key: draft.priv_key,
            pub_key: draft.pub_key,
            owner_id: draft.owner_id,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Creation input for a key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSshKey {
    pub name: String,
    pub key_type: String,
    pub length: u32,
    pub fingerprint: String,
    pub priv_key: String,
    pub pub_key: String,
    #[serde(default)]
    pub owner_id: Option<EntityId>,
}

impl NewSshKey {
    pub fn owned_by(mut self, user: EntityId) -> Self {
        self.owner_id = Some(user);
        self
    }
}

impl EntityDraft for NewSshKey {
    fn name(&self) -> &str {
        &self.name
    }
}

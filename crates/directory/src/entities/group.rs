use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Entity, EntityDraft, EntityId, EntityKind};

/// Access-scoping label; members are tracked by the relation store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: EntityId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Group {
    type Draft = NewGroup;

    const KIND: EntityKind = EntityKind::Group;

    fn id(&self) -> EntityId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn from_draft(id: EntityId, draft: NewGroup, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: draft.name,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewGroup {
    pub name: String,
}

impl NewGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl EntityDraft for NewGroup {
    fn name(&self) -> &str {
        &self.name
    }
}

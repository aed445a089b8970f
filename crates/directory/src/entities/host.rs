//! Target machines reachable through the bastion

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Entity, EntityDraft, EntityId, EntityKind};

/// A connectable target host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    pub id: EntityId,
    pub name: String,
    /// Normalized `hostname:port`
    pub addr: String,
    /// Login user on the target
    pub user: String,
    #[serde(skip_serializing, default)]
    pub password: Option<String>,
    /// Expected host key fingerprint, empty when unknown
    pub fingerprint: String,
    /// Credential used for outbound authentication
    pub key_id: Option<EntityId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Host {
    /// Connection string in `user@addr` form
    pub fn url(&self) -> String {
        format!("{}@{}", self.user, self.addr)
    }

    /// The address without its port
    ///
    /// Bracketed IPv6 literals keep their brackets.
    pub fn hostname(&self) -> &str {
        let addr = self.addr.as_str();
        if addr.starts_with('[') {
            if let Some(end) = addr.find(']') {
                return &addr[..=end];
            }
        }
        match addr.split_once(':') {
            Some((host, _)) => host,
            None => addr,
        }
    }
}

impl Entity for Host {
    type Draft = NewHost;

    const KIND: EntityKind = EntityKind::Host;

    fn id(&self) -> EntityId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn from_draft(id: EntityId, draft: NewHost, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: draft.name,
            addr: draft.addr,
            user: draft.user,
            password: draft.password,
            fingerprint: draft.fingerprint,
            key_id: draft.key_id,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Creation input for a host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewHost {
    pub name: String,
    pub addr: String,
    pub user: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub fingerprint: String,
    #[serde(default)]
    pub key_id: Option<EntityId>,
}

impl NewHost {
    pub fn new(name: impl Into<String>, addr: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            addr: addr.into(),
            user: user.into(),
            password: None,
            fingerprint: String::new(),
            key_id: None,
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.fingerprint = fingerprint.into();
        self
    }

    pub fn with_key(mut self, key_id: EntityId) -> Self {
        self.key_id = Some(key_id);
        self
    }
}

impl EntityDraft for NewHost {
    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host(addr: &str, user: &str) -> Host {
        Host::from_draft(EntityId(1), NewHost::new("target", addr, user), Utc::now())
    }

    #[test]
    fn test_url_and_hostname() {
        let h = host("whoami.filippo.io:22", "test");
        assert_eq!(h.url(), "test@whoami.filippo.io:22");
        assert_eq!(h.hostname(), "whoami.filippo.io");
    }

    #[test]
    fn test_hostname_without_port() {
        assert_eq!(host("sdf.org", "new").hostname(), "sdf.org");
    }

    #[test]
    fn test_hostname_ipv6() {
        assert_eq!(host("[::1]:2222", "root").hostname(), "[::1]");
        assert_eq!(host("[fe80::1]", "root").hostname(), "[fe80::1]");
    }

    #[test]
    fn test_password_is_not_serialized() {
        let mut h = host("sdf.org:22", "new");
        h.password = Some("hunter2".to_string());
        let json = serde_json::to_string(&h).unwrap();
        assert!(!json.contains("hunter2"));
    }

    #[test]
    fn test_draft_builders() {
        let draft = NewHost::new("db", "db.internal:22", "ops")
            .with_password("pw")
            .with_fingerprint("SHA256:abc")
            .with_key(EntityId(3));
        assert_eq!(draft.password.as_deref(), Some("pw"));
        assert_eq!(draft.key_id, Some(EntityId(3)));
        assert_eq!(EntityDraft::name(&draft), "db");
    }
}

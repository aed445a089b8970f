//! # Directory Resolver
//!
//! Maps session identities and id-or-name queries to directory records, and
//! wraps the store's write side with name validation and address
//! normalization.

use common::journal::{
    log_dangling_credential, log_membership_added, log_session_refused, log_session_resolved,
};
use std::sync::Arc;
use tracing::{debug, info};

use crate::address::{self, DEFAULT_SCHEME};
use crate::entities::{
    validate_name, Entity, EntityDraft, Group, Host, NewGroup, NewHost, NewSshKey, NewUser,
    SshKey, User,
};
use crate::error::{DirectoryError, DirectoryResult};
use crate::store::{DirectoryStore, EntityStore, Member, Predicate};

/// Port appended to host addresses that do not name one
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Source of the target name an SSH session asks for
pub trait SessionIdentity {
    fn target(&self) -> &str;
}

impl SessionIdentity for str {
    fn target(&self) -> &str {
        self
    }
}

impl SessionIdentity for String {
    fn target(&self) -> &str {
        self.as_str()
    }
}

/// Resolver over an injected store
pub struct Directory<S: ?Sized> {
    store: Arc<S>,
    default_port: u16,
}

impl<S: ?Sized> Clone for Directory<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            default_port: self.default_port,
        }
    }
}

impl<S: DirectoryStore + ?Sized> Directory<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            default_port: DEFAULT_SSH_PORT,
        }
    }

    pub fn with_default_port(mut self, port: u16) -> Self {
        self.default_port = port;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn default_port(&self) -> u16 {
        self.default_port
    }

    /// Host whose name equals the session's claimed target
    ///
    /// An empty identity is refused without consulting the store.
    pub async fn resolve_session_host<I>(&self, session: &I) -> DirectoryResult<Host>
    where
        I: SessionIdentity + ?Sized,
    {
        let identity = session.target();
        if identity.is_empty() {
            log_session_refused(identity, "empty identity");
            return Err(DirectoryError::NoSuchTarget(String::new()));
        }

        let found =
            EntityStore::<Host>::find_one(self.store.as_ref(), &Predicate::name(identity)).await?;

        match found {
            Some(host) => {
                log_session_resolved(identity, host.id.0, &host.url());
                Ok(host)
            }
            None => {
                log_session_refused(identity, "no host with that name");
                Err(DirectoryError::NoSuchTarget(identity.to_string()))
            }
        }
    }

    async fn find_by_id_or_name<E>(&self, query: &str) -> DirectoryResult<E>
    where
        E: Entity,
        S: EntityStore<E>,
    {
        debug!("Resolving {} {:?}", E::KIND, query);
        EntityStore::<E>::find_one(self.store.as_ref(), &Predicate::id_or_name(query))
            .await?
            .ok_or_else(|| DirectoryError::not_found(E::KIND, query))
    }

    // Sequential and fail-fast; store errors pass through unwrapped
    async fn find_all_by_id_or_name<E, Q>(&self, queries: &[Q]) -> DirectoryResult<Vec<E>>
    where
        E: Entity,
        S: EntityStore<E>,
        Q: AsRef<str>,
    {
        let mut found = Vec::with_capacity(queries.len());
        for (index, query) in queries.iter().enumerate() {
            let query = query.as_ref();
            match self.find_by_id_or_name::<E>(query).await {
                Ok(entity) => found.push(entity),
                Err(err @ DirectoryError::NotFound { .. }) => {
                    return Err(DirectoryError::BatchResolutionFailed {
                        index,
                        query: query.to_string(),
                        source: Box::new(err),
                    })
                }
                Err(err) => return Err(err),
            }
        }
        Ok(found)
    }

    pub async fn find_host_by_id_or_name(&self, query: &str) -> DirectoryResult<Host> {
        self.find_by_id_or_name(query).await
    }

    pub async fn find_hosts_by_id_or_name<Q: AsRef<str>>(
        &self,
        queries: &[Q],
    ) -> DirectoryResult<Vec<Host>> {
        self.find_all_by_id_or_name(queries).await
    }

    pub async fn find_key_by_id_or_name(&self, query: &str) -> DirectoryResult<SshKey> {
        self.find_by_id_or_name(query).await
    }

    pub async fn find_keys_by_id_or_name<Q: AsRef<str>>(
        &self,
        queries: &[Q],
    ) -> DirectoryResult<Vec<SshKey>> {
        self.find_all_by_id_or_name(queries).await
    }

    pub async fn find_user_by_id_or_name(&self, query: &str) -> DirectoryResult<User> {
        self.find_by_id_or_name(query).await
    }

    pub async fn find_users_by_id_or_name<Q: AsRef<str>>(
        &self,
        queries: &[Q],
    ) -> DirectoryResult<Vec<User>> {
        self.find_all_by_id_or_name(queries).await
    }

    pub async fn find_group_by_id_or_name(&self, query: &str) -> DirectoryResult<Group> {
        self.find_by_id_or_name(query).await
    }

    pub async fn find_groups_by_id_or_name<Q: AsRef<str>>(
        &self,
        queries: &[Q],
    ) -> DirectoryResult<Vec<Group>> {
        self.find_all_by_id_or_name(queries).await
    }

    /// Key the host authenticates with, if it has one that still exists
    pub async fn resolve_credential(&self, host: &Host) -> DirectoryResult<Option<SshKey>> {
        let Some(key_id) = host.key_id else {
            return Ok(None);
        };

        let key =
            EntityStore::<SshKey>::find_one(self.store.as_ref(), &Predicate::IdEquals(key_id))
                .await?;
        if key.is_none() {
            log_dangling_credential(&host.name, key_id.0);
        }
        Ok(key)
    }

    pub async fn host_groups(&self, host: &Host) -> DirectoryResult<Vec<Group>> {
        Ok(self.store.groups_of(Member::Host(host.id)).await?)
    }

    pub async fn user_groups(&self, user: &User) -> DirectoryResult<Vec<Group>> {
        Ok(self.store.groups_of(Member::User(user.id)).await?)
    }

    pub async fn user_keys(&self, user: &User) -> DirectoryResult<Vec<SshKey>> {
        Ok(self.store.keys_owned_by(user.id).await?)
    }

    async fn create_entity<E>(&self, draft: E::Draft) -> DirectoryResult<E>
    where
        E: Entity,
        S: EntityStore<E>,
    {
        validate_name(E::KIND, draft.name())?;
        let entity = EntityStore::<E>::create(self.store.as_ref(), draft).await?;
        info!("Created {} {} ({})", E::KIND, entity.name(), entity.id());
        Ok(entity)
    }

    /// Create a host; the address is normalized to `host:port` first
    pub async fn create_host(&self, mut draft: NewHost) -> DirectoryResult<Host> {
        draft.addr = address::normalize_addr(&draft.addr, self.default_port)?;
        self.create_entity(draft).await
    }

    pub async fn create_key(&self, draft: NewSshKey) -> DirectoryResult<SshKey> {
        self.create_entity(draft).await
    }

    pub async fn create_user(&self, draft: NewUser) -> DirectoryResult<User> {
        self.create_entity(draft).await
    }

    pub async fn create_group(&self, draft: NewGroup) -> DirectoryResult<Group> {
        self.create_entity(draft).await
    }

    /// Build a host draft from a connection string
    ///
    /// `name` defaults to the parsed hostname. No key is attached.
    pub fn host_draft_from_url(&self, raw: &str, name: Option<&str>) -> DirectoryResult<NewHost> {
        let parsed = address::parse(raw)?;
        let name = name.map_or_else(|| parsed.host.clone(), str::to_string);

        Ok(NewHost {
            name,
            addr: parsed.addr_with_port(self.default_port),
            password: parsed.password().map(str::to_string),
            user: parsed.user,
            fingerprint: String::new(),
            key_id: None,
        })
    }

    /// Parse `raw` (with or without `ssh://`) and create the host it describes
    pub async fn create_host_from_url(
        &self,
        raw: &str,
        name: Option<&str>,
    ) -> DirectoryResult<Host> {
        debug!("Creating host from {} url {:?}", DEFAULT_SCHEME, raw);
        let draft = self.host_draft_from_url(raw, name)?;
        self.create_host(draft).await
    }

    /// Add hosts to a group; nothing is written unless every query resolves
    ///
    /// Returns the number of memberships that did not exist before.
    pub async fn add_hosts_to_group<Q: AsRef<str>>(
        &self,
        group_query: &str,
        host_queries: &[Q],
    ) -> DirectoryResult<usize> {
        let group = self.find_group_by_id_or_name(group_query).await?;
        let hosts = self.find_hosts_by_id_or_name(host_queries).await?;

        let mut added = 0;
        for host in &hosts {
            if self.store.add_membership(group.id, Member::Host(host.id)).await? {
                log_membership_added(&group.name, "host", &host.name);
                added += 1;
            }
        }
        Ok(added)
    }

    /// Add users to a group; nothing is written unless every query resolves
    pub async fn add_users_to_group<Q: AsRef<str>>(
        &self,
        group_query: &str,
        user_queries: &[Q],
    ) -> DirectoryResult<usize> {
        let group = self.find_group_by_id_or_name(group_query).await?;
        let users = self.find_users_by_id_or_name(user_queries).await?;

        let mut added = 0;
        for user in &users {
            if self.store.add_membership(group.id, Member::User(user.id)).await? {
                log_membership_added(&group.name, "user", &user.name);
                added += 1;
            }
        }
        Ok(added)
    }

    /// Find-or-create the demo hosts
    pub async fn seed_demo(&self) -> DirectoryResult<Vec<Host>> {
        Ok(crate::seed::seed_demo(self.store.as_ref()).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{EntityId, EntityKind};
    use crate::store::MemoryStore;

    fn directory() -> Directory<MemoryStore> {
        Directory::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_resolve_session_host() {
        let dir = directory();
        dir.create_host(NewHost::new("sdf", "sdf.org:22", "new"))
            .await
            .unwrap();

        let host = dir.resolve_session_host("sdf").await.unwrap();
        assert_eq!(host.addr, "sdf.org:22");
        assert_eq!(host.user, "new");

        match dir.resolve_session_host("sdg").await {
            Err(DirectoryError::NoSuchTarget(identity)) => assert_eq!(identity, "sdg"),
            other => panic!("expected NoSuchTarget, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_identity_refused() {
        let dir = directory();
        let identity = String::new();
        match dir.resolve_session_host(&identity).await {
            Err(DirectoryError::NoSuchTarget(identity)) => assert!(identity.is_empty()),
            other => panic!("expected NoSuchTarget, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_host_appends_default_port() {
        let dir = directory().with_default_port(2222);
        let host = dir
            .create_host(NewHost::new("bare", "bare.example", "root"))
            .await
            .unwrap();
        assert_eq!(host.addr, "bare.example:2222");
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_names() {
        let dir = directory();
        let err = dir.create_group(NewGroup::new("no spaces")).await.unwrap_err();
        assert!(matches!(err, DirectoryError::InvalidName { .. }));
        assert!(EntityStore::<Group>::list(dir.store().as_ref())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_create_host_from_url_defaults_name() {
        let dir = directory();
        let host = dir
            .create_host_from_url("ssh://test:pw@whoami.filippo.io", None)
            .await
            .unwrap();
        assert_eq!(host.name, "whoami.filippo.io");
        assert_eq!(host.addr, "whoami.filippo.io:22");
        assert_eq!(host.user, "test");
        assert_eq!(host.password.as_deref(), Some("pw"));
        assert_eq!(host.key_id, None);
    }

    #[tokio::test]
    async fn test_create_host_from_url_keeps_written_port() {
        let dir = directory();
        let host = dir
            .create_host_from_url("http://ops@jump.example:80", Some("jump"))
            .await
            .unwrap();
        assert_eq!(host.addr, "jump.example:80");
        assert_eq!(host.user, "ops");
    }

    #[tokio::test]
    async fn test_batch_lookup_preserves_order() {
        let dir = directory();
        let a = dir.create_host(NewHost::new("alpha", "a.example", "root")).await.unwrap();
        let b = dir.create_host(NewHost::new("beta", "b.example", "root")).await.unwrap();

        let queries = vec!["beta".to_string(), a.id.to_string()];
        let hosts = dir.find_hosts_by_id_or_name(&queries).await.unwrap();
        let ids: Vec<EntityId> = hosts.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![b.id, a.id]);
    }

    #[tokio::test]
    async fn test_batch_lookup_fails_fast() {
        let dir = directory();
        dir.create_host(NewHost::new("alpha", "a.example", "root")).await.unwrap();

        match dir.find_hosts_by_id_or_name(&["alpha", "missing", "alpha"]).await {
            Err(DirectoryError::BatchResolutionFailed { index, query, source }) => {
                assert_eq!(index, 1);
                assert_eq!(query, "missing");
                assert!(matches!(*source, DirectoryError::NotFound { .. }));
            }
            other => panic!("expected BatchResolutionFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_users_groups_and_keys_by_id_or_name() {
        let dir = directory();
        let alice = dir.create_user(NewUser::new("alice")).await.unwrap();
        let bob = dir.create_user(NewUser::new("bob1")).await.unwrap();
        let ops = dir.create_group(NewGroup::new("ops")).await.unwrap();
        let key = dir
            .create_key(NewSshKey {
                name: "deploy".to_string(),
                key_type: "rsa".to_string(),
                length: 4096,
                fingerprint: "SHA256:def".to_string(),
                priv_key: "private".to_string(),
                pub_key: "public".to_string(),
                owner_id: None,
            })
            .await
            .unwrap();

        assert_eq!(dir.find_user_by_id_or_name("alice").await.unwrap(), alice);
        assert_eq!(
            dir.find_group_by_id_or_name(&ops.id.to_string()).await.unwrap(),
            ops
        );
        assert_eq!(dir.find_key_by_id_or_name("deploy").await.unwrap().id, key.id);

        let users = dir.find_users_by_id_or_name(&["bob1", "alice"]).await.unwrap();
        assert_eq!(users, vec![bob, alice]);
        assert_eq!(dir.find_groups_by_id_or_name(&["ops"]).await.unwrap(), vec![ops]);

        match dir.find_keys_by_id_or_name(&["deploy", "backup"]).await {
            Err(DirectoryError::BatchResolutionFailed { index, source, .. }) => {
                assert_eq!(index, 1);
                assert!(matches!(
                    *source,
                    DirectoryError::NotFound { kind: EntityKind::SshKey, .. }
                ));
            }
            other => panic!("expected BatchResolutionFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_resolve_credential() {
        let dir = directory();
        let key = dir
            .create_key(NewSshKey {
                name: "deploy".to_string(),
                key_type: "ed25519".to_string(),
                length: 256,
                fingerprint: "SHA256:abc".to_string(),
                priv_key: "private".to_string(),
                pub_key: "public".to_string(),
                owner_id: None,
            })
            .await
            .unwrap();
        let host = dir
            .create_host(NewHost::new("db", "db.internal", "ops").with_key(key.id))
            .await
            .unwrap();

        let credential = dir.resolve_credential(&host).await.unwrap().unwrap();
        assert_eq!(credential.id, key.id);

        // A stale copy still pointing at a deleted key
        EntityStore::<SshKey>::delete(dir.store().as_ref(), key.id)
            .await
            .unwrap();
        assert!(dir.resolve_credential(&host).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_group_batch_writes_nothing_on_miss() {
        let dir = directory();
        dir.create_group(NewGroup::new("ops")).await.unwrap();
        let alpha = dir.create_host(NewHost::new("alpha", "a.example", "root")).await.unwrap();

        let err = dir
            .add_hosts_to_group("ops", &["alpha", "ghost"])
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(dir.host_groups(&alpha).await.unwrap().is_empty());

        assert_eq!(dir.add_hosts_to_group("ops", &["alpha"]).await.unwrap(), 1);
        assert_eq!(dir.add_hosts_to_group("ops", &["alpha"]).await.unwrap(), 0);
        assert_eq!(dir.host_groups(&alpha).await.unwrap()[0].name, "ops");
    }
}

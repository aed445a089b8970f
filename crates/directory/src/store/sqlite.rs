//! SQLite-backed directory store

use async_trait::async_trait;
use chrono::Utc;
use common::config::DatabaseConfig;
use common::error::PersistenceError;
use common::persistence::{
    DatabaseConnection, Migration, MigrationManager, MigrationStatus, SqliteConnection,
};
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Row, Sqlite, SqlitePool};
use tracing::{debug, info};

use self::sealed::SqlRecord;
use super::{EntityStore, Member, Predicate, RelationStore};
use crate::entities::{EntityId, Group, SshKey};

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

/// Directory schema, applied in order and recorded in `_migrations`
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_directory_tables",
        sql: r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS ssh_keys (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                key_type TEXT NOT NULL,
                length INTEGER NOT NULL,
                fingerprint TEXT NOT NULL,
                priv_key TEXT NOT NULL,
                pub_key TEXT NOT NULL,
                owner_id INTEGER REFERENCES users(id) ON DELETE SET NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS hosts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                addr TEXT NOT NULL,
                user TEXT NOT NULL,
                password TEXT,
                fingerprint TEXT NOT NULL DEFAULT '',
                key_id INTEGER REFERENCES ssh_keys(id) ON DELETE SET NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS groups (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS user_groups (
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                group_id INTEGER NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
                PRIMARY KEY (user_id, group_id)
            );

            CREATE TABLE IF NOT EXISTS host_groups (
                host_id INTEGER NOT NULL REFERENCES hosts(id) ON DELETE CASCADE,
                group_id INTEGER NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
                PRIMARY KEY (host_id, group_id)
            );
        "#,
    },
    Migration {
        version: 2,
        name: "index_directory_references",
        sql: r#"
            CREATE INDEX IF NOT EXISTS idx_hosts_key_id ON hosts(key_id);
            CREATE INDEX IF NOT EXISTS idx_ssh_keys_owner_id ON ssh_keys(owner_id);
            CREATE INDEX IF NOT EXISTS idx_user_groups_group_id ON user_groups(group_id);
            CREATE INDEX IF NOT EXISTS idx_host_groups_group_id ON host_groups(group_id);
        "#,
    },
];

/// Directory store on top of a shared SQLite pool
#[derive(Debug, Clone)]
pub struct SqliteStore {
    connection: SqliteConnection,
}

impl SqliteStore {
    /// Open the database described by `config`, migrating it when enabled
    pub async fn new(config: &DatabaseConfig) -> Result<Self, PersistenceError> {
        let store = Self {
            connection: SqliteConnection::new(config).await?,
        };

        if config.run_migrations {
            store.run_migrations().await?;
        }

        Ok(store)
    }

    /// Fresh in-memory database with the schema applied
    pub async fn in_memory() -> Result<Self, PersistenceError> {
        Self::new(&DatabaseConfig::in_memory()).await
    }

    pub fn connection(&self) -> &SqliteConnection {
        &self.connection
    }

    fn pool(&self) -> &SqlitePool {
        self.connection.pool()
    }

    pub async fn health_check(&self) -> Result<(), PersistenceError> {
        self.connection.health_check().await
    }
}

#[async_trait]
impl MigrationManager for SqliteStore {
    async fn run_migrations(&self) -> Result<usize, PersistenceError> {
        let applied = self.connection.apply_migrations(MIGRATIONS).await?;
        if applied > 0 {
            info!("Applied {} directory migration(s)", applied);
        }
        Ok(applied)
    }

    async fn get_current_version(&self) -> Result<i64, PersistenceError> {
        self.connection.current_version().await
    }

    async fn migration_status(&self) -> Result<MigrationStatus, PersistenceError> {
        self.connection.migration_status(MIGRATIONS).await
    }
}

mod sealed {
    use sqlx::sqlite::SqliteRow;
    use sqlx::Row;

    use super::SqliteQuery;
    use crate::entities::{Entity, EntityId, Group, Host, SshKey, User};

    /// Table mapping for one entity kind
    pub trait SqlRecord: Entity {
        const TABLE: &'static str;

        /// Draft columns, bound in this order by `bind_draft`
        const COLUMNS: &'static [&'static str];

        fn bind_draft<'q>(draft: &'q Self::Draft, query: SqliteQuery<'q>) -> SqliteQuery<'q>;

        fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error>;
    }

    fn opt_id(row: &SqliteRow, column: &str) -> Result<Option<EntityId>, sqlx::Error> {
        Ok(row.try_get::<Option<i64>, _>(column)?.map(EntityId))
    }

    impl SqlRecord for User {
        const TABLE: &'static str = "users";
        const COLUMNS: &'static [&'static str] = &["name"];

        fn bind_draft<'q>(draft: &'q Self::Draft, query: SqliteQuery<'q>) -> SqliteQuery<'q> {
            query.bind(draft.name.as_str())
        }

        fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
            Ok(Self {
                id: EntityId(row.try_get("id")?),
                name: row.try_get("name")?,
                created_at: row.try_get("created_at")?,
                updated_at: row.try_get("updated_at")?,
            })
        }
    }

    impl SqlRecord for SshKey {
        const TABLE: &'static str = "ssh_keys";
        const COLUMNS: &'static [&'static str] = &[
            "name",
            "key_type",
            "length",
            "fingerprint",
            "priv_key",
            "pub_key",
            "owner_id",
        ];

        fn bind_draft<'q>(draft: &'q Self::Draft, query: SqliteQuery<'q>) -> SqliteQuery<'q> {
            query
                .bind(draft.name.as_str())
                .bind(draft.key_type.as_str())
                .bind(draft.length)
                .bind(draft.fingerprint.as_str())
                .bind(draft.priv_key.as_str())
                .bind(draft.pub_key.as_str())
                .bind(draft.owner_id.map(EntityId::value))
        }

        fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
            Ok(Self {
                id: EntityId(row.try_get("id")?),
                name: row.try_get("name")?,
                key_type: row.try_get("key_type")?,
                length: row.try_get("length")?,
                fingerprint: row.try_get("fingerprint")?,
                priv_key: row.try_get("priv_key")?,
                pub_key: row.try_get("pub_key")?,
                owner_id: opt_id(row, "owner_id")?,
                created_at: row.try_get("created_at")?,
                updated_at: row.try_get("updated_at")?,
            })
        }
    }

    impl SqlRecord for Host {
        const TABLE: &'static str = "hosts";
        const COLUMNS: &'static [&'static str] = &[
            "name",
            "addr",
            "user",
            "password",
            "fingerprint",
            "key_id",
        ];

        fn bind_draft<'q>(draft: &'q Self::Draft, query: SqliteQuery<'q>) -> SqliteQuery<'q> {
            query
                .bind(draft.name.as_str())
                .bind(draft.addr.as_str())
                .bind(draft.user.as_str())
                .bind(draft.password.as_deref())
                .bind(draft.fingerprint.as_str())
                .bind(draft.key_id.map(EntityId::value))
        }

        fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
            Ok(Self {
                id: EntityId(row.try_get("id")?),
                name: row.try_get("name")?,
                addr: row.try_get("addr")?,
                user: row.try_get("user")?,
                password: row.try_get("password")?,
                fingerprint: row.try_get("fingerprint")?,
                key_id: opt_id(row, "key_id")?,
                created_at: row.try_get("created_at")?,
                updated_at: row.try_get("updated_at")?,
            })
        }
    }

    impl SqlRecord for Group {
        const TABLE: &'static str = "groups";
        const COLUMNS: &'static [&'static str] = &["name"];

        fn bind_draft<'q>(draft: &'q Self::Draft, query: SqliteQuery<'q>) -> SqliteQuery<'q> {
            query.bind(draft.name.as_str())
        }

        fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
            Ok(Self {
                id: EntityId(row.try_get("id")?),
                name: row.try_get("name")?,
                created_at: row.try_get("created_at")?,
                updated_at: row.try_get("updated_at")?,
            })
        }
    }
}

fn predicate_clause(predicate: &Predicate) -> &'static str {
    match predicate {
        Predicate::NameEquals(_) => "name = ?",
        Predicate::IdEquals(_) => "id = ?",
        Predicate::IdOrName(_) => "id = ? OR name = ?",
    }
}

fn bind_predicate<'q>(query: SqliteQuery<'q>, predicate: &'q Predicate) -> SqliteQuery<'q> {
    match predicate {
        Predicate::NameEquals(name) => query.bind(name.as_str()),
        Predicate::IdEquals(id) => query.bind(id.0),
        Predicate::IdOrName(q) => query.bind(q.parse::<i64>().ok()).bind(q.as_str()),
    }
}

fn decode_row<E: SqlRecord>(row: &SqliteRow) -> Result<E, PersistenceError> {
    E::from_row(row).map_err(|e| PersistenceError::DeserializationFailed {
        details: format!("{} row: {e}", E::TABLE),
    })
}

fn decode_rows<E: SqlRecord>(rows: &[SqliteRow]) -> Result<Vec<E>, PersistenceError> {
    rows.iter().map(decode_row).collect()
}

fn membership_table(member: Member) -> (&'static str, &'static str) {
    match member {
        Member::User(_) => ("user_groups", "user_id"),
        Member::Host(_) => ("host_groups", "host_id"),
    }
}

#[async_trait]
impl<E: SqlRecord> EntityStore<E> for SqliteStore {
    async fn find_one(&self, predicate: &Predicate) -> Result<Option<E>, PersistenceError> {
        let sql = format!(
            "SELECT * FROM {} WHERE {} ORDER BY id LIMIT 1",
            E::TABLE,
            predicate_clause(predicate)
        );
        debug!("Looking up {} with {:?}", E::KIND, predicate);

        let row = bind_predicate(sqlx::query(&sql), predicate)
            .fetch_optional(self.pool())
            .await
            .map_err(|e| PersistenceError::from_sqlx(sql.as_str(), e))?;

        row.as_ref().map(decode_row::<E>).transpose()
    }

    async fn create(&self, draft: E::Draft) -> Result<E, PersistenceError> {
        let now = Utc::now();
        let placeholders = vec!["?"; E::COLUMNS.len() + 2].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}, created_at, updated_at) VALUES ({})",
            E::TABLE,
            E::COLUMNS.join(", "),
            placeholders
        );

        let result = E::bind_draft(&draft, sqlx::query(&sql))
            .bind(now)
            .bind(now)
            .execute(self.pool())
            .await
            .map_err(|e| PersistenceError::from_sqlx(sql.as_str(), e))?;

        let entity = E::from_draft(EntityId(result.last_insert_rowid()), draft, now);
        debug!("Created {} {} ({})", E::KIND, entity.name(), entity.id());
        Ok(entity)
    }

    async fn delete(&self, id: EntityId) -> Result<bool, PersistenceError> {
        let sql = format!("DELETE FROM {} WHERE id = ?", E::TABLE);
        let result = sqlx::query(&sql)
            .bind(id.0)
            .execute(self.pool())
            .await
            .map_err(|e| PersistenceError::from_sqlx(sql.as_str(), e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn list(&self) -> Result<Vec<E>, PersistenceError> {
        let sql = format!("SELECT * FROM {} ORDER BY id", E::TABLE);
        let rows = sqlx::query(&sql)
            .fetch_all(self.pool())
            .await
            .map_err(|e| PersistenceError::from_sqlx(sql.as_str(), e))?;

        decode_rows(&rows)
    }
}

#[async_trait]
impl RelationStore for SqliteStore {
    async fn add_membership(
        &self,
        group: EntityId,
        member: Member,
    ) -> Result<bool, PersistenceError> {
        let (table, column) = membership_table(member);
        let sql = format!("INSERT OR IGNORE INTO {table} ({column}, group_id) VALUES (?, ?)");

        let result = sqlx::query(&sql)
            .bind(member.id().0)
            .bind(group.0)
            .execute(self.pool())
            .await
            .map_err(|e| PersistenceError::from_sqlx(sql.as_str(), e))?;

        Ok(result.rows_affected() == 1)
    }

    async fn remove_membership(
        &self,
        group: EntityId,
        member: Member,
    ) -> Result<bool, PersistenceError> {
        let (table, column) = membership_table(member);
        let sql = format!("DELETE FROM {table} WHERE {column} = ? AND group_id = ?");

        let result = sqlx::query(&sql)
            .bind(member.id().0)
            .bind(group.0)
            .execute(self.pool())
            .await
            .map_err(|e| PersistenceError::from_sqlx(sql.as_str(), e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn groups_of(&self, member: Member) -> Result<Vec<Group>, PersistenceError> {
        let (table, column) = membership_table(member);
        let sql = format!(
            "SELECT g.* FROM groups g JOIN {table} m ON m.group_id = g.id \
             WHERE m.{column} = ? ORDER BY g.id"
        );

        let rows = sqlx::query(&sql)
            .bind(member.id().0)
            .fetch_all(self.pool())
            .await
            .map_err(|e| PersistenceError::from_sqlx(sql.as_str(), e))?;

        decode_rows(&rows)
    }

    async fn keys_owned_by(&self, user: EntityId) -> Result<Vec<SshKey>, PersistenceError> {
        let sql = "SELECT * FROM ssh_keys WHERE owner_id = ? ORDER BY id";
        let rows = sqlx::query(sql)
            .bind(user.0)
            .fetch_all(self.pool())
            .await
            .map_err(|e| PersistenceError::from_sqlx(sql, e))?;

        decode_rows(&rows)
    }
}

/// Row count per directory table, used by `directoryctl` status output
pub async fn table_counts(
    store: &SqliteStore,
) -> Result<Vec<(&'static str, i64)>, PersistenceError> {
    let mut counts = Vec::new();
    for table in ["users", "ssh_keys", "hosts", "groups", "user_groups", "host_groups"] {
        let sql = format!("SELECT COUNT(*) AS count FROM {table}");
        let row = sqlx::query(&sql)
            .fetch_one(store.pool())
            .await
            .map_err(|e| PersistenceError::from_sqlx(sql.as_str(), e))?;
        let count: i64 = row
            .try_get("count")
            .map_err(|e| PersistenceError::query_failed(sql.as_str(), e))?;
        counts.push((table, count));
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Host, NewGroup, NewHost, NewSshKey, NewUser, User};

    fn key_draft(name: &str) -> NewSshKey {
        NewSshKey {
            name: name.to_string(),
            key_type: "rsa".to_string(),
            length: 4096,
            fingerprint: "SHA256:abc".to_string(),
            priv_key: "private".to_string(),
            pub_key: "ssh-rsa AAAA".to_string(),
            owner_id: None,
        }
    }

    #[tokio::test]
    async fn test_migrations_are_recorded() {
        let store = SqliteStore::in_memory().await.unwrap();
        assert_eq!(store.get_current_version().await.unwrap(), 2);
        assert_eq!(store.run_migrations().await.unwrap(), 0);
        assert!(store.migration_status().await.unwrap().is_up_to_date());
        assert!(store.health_check().await.is_ok());
    }

    #[tokio::test]
    async fn test_host_roundtrip_through_store() {
        let store = SqliteStore::in_memory().await.unwrap();
        let created: Host = store
            .create(NewHost::new("sdf", "sdf.org:22", "new").with_password("pw"))
            .await
            .unwrap();

        let by_name: Host = store
            .find_one(&Predicate::name("sdf"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_name.id, created.id);
        assert_eq!(by_name.password.as_deref(), Some("pw"));
        assert_eq!(by_name.key_id, None);

        let by_id: Host = store
            .find_one(&Predicate::id_or_name(created.id.to_string()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_id, by_name);
    }

    #[tokio::test]
    async fn test_id_or_name_prefers_lowest_id() {
        let store = SqliteStore::in_memory().await.unwrap();
        let first: Group = store.create(NewGroup::new("ops")).await.unwrap();
        // Named after the first group's id
        let named_one: Group = store.create(NewGroup::new("1")).await.unwrap();

        let found: Group = store
            .find_one(&Predicate::id_or_name("1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, first.id);
        assert_ne!(found.id, named_one.id);
    }

    #[tokio::test]
    async fn test_unique_names() {
        let store = SqliteStore::in_memory().await.unwrap();
        let _: User = store.create(NewUser::new("alice")).await.unwrap();
        let err = EntityStore::<User>::create(&store, NewUser::new("alice"))
            .await
            .unwrap_err();
        assert!(err.is_constraint_violation());
    }

    #[tokio::test]
    async fn test_delete_cascades() {
        let store = SqliteStore::in_memory().await.unwrap();
        let alice: User = store.create(NewUser::new("alice")).await.unwrap();
        let key: SshKey = store
            .create(key_draft("deploy").owned_by(alice.id))
            .await
            .unwrap();
        let host: Host = store
            .create(NewHost::new("db", "db.internal:22", "ops").with_key(key.id))
            .await
            .unwrap();
        let ops: Group = store.create(NewGroup::new("ops")).await.unwrap();
        assert!(store.add_membership(ops.id, Member::Host(host.id)).await.unwrap());
        assert!(store.add_membership(ops.id, Member::User(alice.id)).await.unwrap());

        assert_eq!(store.keys_owned_by(alice.id).await.unwrap().len(), 1);

        assert!(EntityStore::<SshKey>::delete(&store, key.id).await.unwrap());
        let reloaded: Host = store
            .find_one(&Predicate::IdEquals(host.id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reloaded.key_id, None);

        assert!(EntityStore::<User>::delete(&store, alice.id).await.unwrap());
        assert!(store.groups_of(Member::User(alice.id)).await.unwrap().is_empty());

        assert!(EntityStore::<Group>::delete(&store, ops.id).await.unwrap());
        assert!(store.groups_of(Member::Host(host.id)).await.unwrap().is_empty());
        assert!(!EntityStore::<Group>::delete(&store, ops.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_membership_is_idempotent() {
        let store = SqliteStore::in_memory().await.unwrap();
        let ops: Group = store.create(NewGroup::new("ops")).await.unwrap();
        let host: Host = store
            .create(NewHost::new("db", "db.internal:22", "ops"))
            .await
            .unwrap();

        assert!(store.add_membership(ops.id, Member::Host(host.id)).await.unwrap());
        assert!(!store.add_membership(ops.id, Member::Host(host.id)).await.unwrap());
        assert!(store.remove_membership(ops.id, Member::Host(host.id)).await.unwrap());
        assert!(!store.remove_membership(ops.id, Member::Host(host.id)).await.unwrap());
    }

    #[tokio::test]
    async fn test_membership_requires_existing_rows() {
        let store = SqliteStore::in_memory().await.unwrap();
        let ops: Group = store.create(NewGroup::new("ops")).await.unwrap();
        let err = store
            .add_membership(ops.id, Member::Host(EntityId(42)))
            .await
            .unwrap_err();
        assert!(err.is_constraint_violation());
    }

    #[tokio::test]
    async fn test_table_counts() {
        let store = SqliteStore::in_memory().await.unwrap();
        let _: Group = store.create(NewGroup::new("ops")).await.unwrap();
        let counts = table_counts(&store).await.unwrap();
        assert!(counts.contains(&("groups", 1)));
        assert!(counts.contains(&("hosts", 0)));
    }
}

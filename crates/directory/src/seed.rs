//! Demo directory contents

use common::error::PersistenceError;
use tracing::info;

use crate::entities::{Host, NewHost};
use crate::store::{EntityStore, Predicate};

/// Public SSH services used to populate a fresh directory
pub fn demo_hosts() -> Vec<NewHost> {
    vec![
        NewHost::new("sdf", "sdf.org:22", "new"),
        NewHost::new("whoami", "whoami.filippo.io:22", "test"),
        NewHost::new("ssh-chat", "chat.shazow.net:22", "test")
            .with_fingerprint("MD5:e5:d5:d1:75:90:38:42:f6:c7:03:d7:d0:56:7d:6a:db"),
    ]
}

/// Find-or-create every demo host by name
pub async fn seed_demo<S>(store: &S) -> Result<Vec<Host>, PersistenceError>
where
    S: EntityStore<Host> + ?Sized,
{
    let mut hosts = Vec::new();
    for draft in demo_hosts() {
        let predicate = Predicate::name(draft.name.clone());
        hosts.push(store.find_or_create(&predicate, draft).await?);
    }

    info!("Demo hosts seeded ({} total)", hosts.len());
    Ok(hosts)
}

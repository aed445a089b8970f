//! # Command Handlers
//!
//! Executes parsed `directoryctl` commands against a directory and renders
//! the results as text or JSON.

use anyhow::{Context, Result};
use common::persistence::{DatabaseConnection, MigrationManager};
use serde::Serialize;
use std::fmt::Write as _;
use tracing::info;

use super::{
    Commands, ConfigCommand, GroupCommand, HostCommand, KeyCommand, OutputFormat, UserCommand,
};
use crate::address;
use crate::config::DirectoryConfig;
use crate::entities::{Group, Host, NewGroup, NewUser, SshKey, User};
use crate::resolver::Directory;
use crate::store::sqlite::table_counts;
use crate::store::{DirectoryStore, EntityStore, SqliteStore};

/// A resolved session target with its credential and groups
#[derive(Debug, Serialize)]
pub struct ResolvedTarget {
    pub host: Host,
    pub url: String,
    pub credential: Option<String>,
    pub groups: Vec<String>,
}

/// A user with its relations
#[derive(Debug, Serialize)]
pub struct UserDetails {
    pub user: User,
    pub groups: Vec<String>,
    pub keys: Vec<String>,
}

/// Run a command against the SQLite-backed directory
pub async fn handle_command(
    command: Commands,
    directory: &Directory<SqliteStore>,
    config: &DirectoryConfig,
    output: OutputFormat,
) -> Result<()> {
    match command {
        Commands::Migrate => migrate(directory.store()).await,
        Commands::Status => status(directory.store(), output).await,
        Commands::Config { config_cmd } => handle_config_command(config_cmd, config),
        other => handle_directory_command(other, directory, output).await,
    }
}

/// Run a command that only needs the store contract
pub async fn handle_directory_command<S: DirectoryStore + ?Sized>(
    command: Commands,
    directory: &Directory<S>,
    output: OutputFormat,
) -> Result<()> {
    let rendered = match command {
        Commands::Seed => {
            let hosts = directory.seed_demo().await.context("Failed to seed demo hosts")?;
            render_hosts(&hosts, output)?
        }
        Commands::Resolve { identity } => {
            let target = resolve_target(directory, &identity).await?;
            render_target(&target, output)?
        }
        Commands::Host { host_cmd } => handle_host_command(host_cmd, directory, output).await?,
        Commands::Key { key_cmd } => handle_key_command(key_cmd, directory, output).await?,
        Commands::User { user_cmd } => handle_user_command(user_cmd, directory, output).await?,
        Commands::Group { group_cmd } => handle_group_command(group_cmd, directory, output).await?,
        Commands::Migrate | Commands::Status | Commands::Config { .. } => {
            anyhow::bail!("command requires the SQLite directory")
        }
    };

    println!("{rendered}");
    Ok(())
}

/// Resolve a session identity together with its credential and groups
pub async fn resolve_target<S: DirectoryStore + ?Sized>(
    directory: &Directory<S>,
    identity: &str,
) -> Result<ResolvedTarget> {
    let host = directory.resolve_session_host(identity).await?;
    let credential = directory
        .resolve_credential(&host)
        .await?
        .map(|key| key.name);
    let groups = names(&directory.host_groups(&host).await?);

    Ok(ResolvedTarget {
        url: host.url(),
        host,
        credential,
        groups,
    })
}

pub async fn handle_host_command<S: DirectoryStore + ?Sized>(
    command: HostCommand,
    directory: &Directory<S>,
    output: OutputFormat,
) -> Result<String> {
    match command {
        HostCommand::List => {
            let hosts: Vec<Host> = EntityStore::<Host>::list(directory.store().as_ref()).await?;
            render_hosts(&hosts, output)
        }
        HostCommand::Show { queries } => {
            let hosts = directory.find_hosts_by_id_or_name(&queries).await?;
            render_hosts(&hosts, output)
        }
        HostCommand::Create {
            url,
            name,
            key,
            fingerprint,
            groups,
        } => {
            let mut draft = directory.host_draft_from_url(&url, name.as_deref())?;
            if let Some(key) = key {
                draft.key_id = Some(directory.find_key_by_id_or_name(&key).await?.id);
            }
            if let Some(fingerprint) = fingerprint {
                draft.fingerprint = fingerprint;
            }
            // Resolve groups before writing anything
            let groups = directory.find_groups_by_id_or_name(&groups).await?;

            let host = directory.create_host(draft).await?;
            let host_id = host.id.to_string();
            for group in &groups {
                directory
                    .add_hosts_to_group(&group.id.to_string(), &[host_id.as_str()])
                    .await?;
            }
            info!("Host {} created", host.name);
            render_hosts(std::slice::from_ref(&host), output)
        }
        HostCommand::Parse { url } => {
            let parsed = address::parse(&url)?;
            match output {
                OutputFormat::Json => Ok(serde_json::to_string_pretty(&parsed)?),
                OutputFormat::Text => Ok(format!(
                    "addr: {}\nuser: {}\npassword: {}",
                    parsed.addr,
                    parsed.user,
                    if parsed.password.is_empty() { "(none)" } else { "(set)" }
                )),
            }
        }
    }
}

pub async fn handle_key_command<S: DirectoryStore + ?Sized>(
    command: KeyCommand,
    directory: &Directory<S>,
    output: OutputFormat,
) -> Result<String> {
    let keys = match command {
        KeyCommand::List => EntityStore::<SshKey>::list(directory.store().as_ref()).await?,
        KeyCommand::Show { queries } => directory.find_keys_by_id_or_name(&queries).await?,
    };
    render_keys(&keys, output)
}

pub async fn handle_user_command<S: DirectoryStore + ?Sized>(
    command: UserCommand,
    directory: &Directory<S>,
    output: OutputFormat,
) -> Result<String> {
    let users = match command {
        UserCommand::Create { name } => vec![directory.create_user(NewUser::new(name)).await?],
        UserCommand::Show { queries } => directory.find_users_by_id_or_name(&queries).await?,
    };

    let mut details = Vec::with_capacity(users.len());
    for user in users {
        let groups = names(&directory.user_groups(&user).await?);
        let keys = directory
            .user_keys(&user)
            .await?
            .into_iter()
            .map(|key| key.name)
            .collect();
        details.push(UserDetails { user, groups, keys });
    }

    match output {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&details)?),
        OutputFormat::Text => {
            let mut out = String::new();
            for d in &details {
                writeln!(
                    out,
                    "{:<5} {:<20} groups=[{}] keys=[{}]",
                    d.user.id,
                    d.user.name,
                    d.groups.join(","),
                    d.keys.join(",")
                )?;
            }
            Ok(out.trim_end().to_string())
        }
    }
}

pub async fn handle_group_command<S: DirectoryStore + ?Sized>(
    command: GroupCommand,
    directory: &Directory<S>,
    output: OutputFormat,
) -> Result<String> {
    match command {
        GroupCommand::Create { name } => {
            let group = directory.create_group(NewGroup::new(name)).await?;
            render_groups(std::slice::from_ref(&group), output)
        }
        GroupCommand::List => {
            let groups: Vec<Group> = EntityStore::<Group>::list(directory.store().as_ref()).await?;
            render_groups(&groups, output)
        }
        GroupCommand::AddHosts { group, hosts } => {
            let added = directory.add_hosts_to_group(&group, &hosts).await?;
            render_added(&group, "host", added, output)
        }
        GroupCommand::AddUsers { group, users } => {
            let added = directory.add_users_to_group(&group, &users).await?;
            render_added(&group, "user", added, output)
        }
    }
}

fn handle_config_command(command: ConfigCommand, config: &DirectoryConfig) -> Result<()> {
    let rendered = match command {
        ConfigCommand::Sample => DirectoryConfig::sample_toml()?,
        ConfigCommand::Show => {
            toml::to_string_pretty(config).context("Failed to render configuration")?
        }
    };
    println!("{rendered}");
    Ok(())
}

async fn migrate(store: &SqliteStore) -> Result<()> {
    let applied = store
        .run_migrations()
        .await
        .context("Failed to run migrations")?;
    let version = store.get_current_version().await?;
    println!("Applied {applied} migration(s); schema version {version}");
    Ok(())
}

async fn status(store: &SqliteStore, output: OutputFormat) -> Result<()> {
    #[derive(Serialize)]
    struct Status {
        schema_version: i64,
        pending_migrations: Vec<String>,
        healthy: bool,
        tables: Vec<(&'static str, i64)>,
    }

    let migrations = store.migration_status().await?;
    let healthy = store.connection().health_check().await.is_ok();
    let status = Status {
        schema_version: migrations.current_version,
        pending_migrations: migrations.pending_migrations,
        healthy,
        tables: table_counts(store).await?,
    };

    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&status)?),
        OutputFormat::Text => {
            println!("Schema version: {}", status.schema_version);
            if !status.pending_migrations.is_empty() {
                println!("Pending: {}", status.pending_migrations.join(", "));
            }
            println!("Healthy: {}", status.healthy);
            for (table, count) in &status.tables {
                println!("  {table:<12} {count}");
            }
        }
    }
    Ok(())
}

fn names(groups: &[Group]) -> Vec<String> {
    groups.iter().map(|g| g.name.clone()).collect()
}

/// Render hosts as an aligned table or JSON array
pub fn render_hosts(hosts: &[Host], output: OutputFormat) -> Result<String> {
    match output {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(hosts)?),
        OutputFormat::Text => {
            let mut out = String::new();
            for host in hosts {
                let key = host
                    .key_id
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "-".to_string());
                writeln!(
                    out,
                    "{:<5} {:<20} {:<36} key={}",
                    host.id,
                    host.name,
                    host.url(),
                    key
                )?;
            }
            Ok(out.trim_end().to_string())
        }
    }
}

pub fn render_keys(keys: &[SshKey], output: OutputFormat) -> Result<String> {
    match output {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(keys)?),
        OutputFormat::Text => {
            let mut out = String::new();
            for key in keys {
                writeln!(
                    out,
                    "{:<5} {:<20} {}-{} {}",
                    key.id, key.name, key.key_type, key.length, key.fingerprint
                )?;
            }
            Ok(out.trim_end().to_string())
        }
    }
}

pub fn render_groups(groups: &[Group], output: OutputFormat) -> Result<String> {
    match output {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(groups)?),
        OutputFormat::Text => Ok(groups
            .iter()
            .map(|g| format!("{:<5} {}", g.id, g.name))
            .collect::<Vec<_>>()
            .join("\n")),
    }
}

fn render_target(target: &ResolvedTarget, output: OutputFormat) -> Result<String> {
    match output {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(target)?),
        OutputFormat::Text => Ok(format!(
            "{} -> {} (key: {}, groups: [{}])",
            target.host.name,
            target.url,
            target.credential.as_deref().unwrap_or("-"),
            target.groups.join(",")
        )),
    }
}

fn render_added(group: &str, kind: &str, added: usize, output: OutputFormat) -> Result<String> {
    match output {
        OutputFormat::Json => {
            Ok(serde_json::json!({ "group": group, "kind": kind, "added": added }).to_string())
        }
        OutputFormat::Text => Ok(format!("Added {added} {kind}(s) to {group}")),
    }
}

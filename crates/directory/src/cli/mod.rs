//! # CLI Module
//!
//! Command-line interface for directory administration: schema migration,
//! demo seeding, target resolution and host/key/group management.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

pub mod handlers;

/// Output format for command results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Bastion Directory - manage and resolve SSH bastion targets",
    long_about = None
)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the configured log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Apply pending schema migrations
    Migrate,
    /// Show schema version, table sizes and database health
    Status,
    /// Find-or-create the demo hosts
    Seed,
    /// Resolve a session identity to its target host
    Resolve {
        /// Target name claimed by the session
        identity: String,
    },
    /// Host management commands
    Host {
        #[command(subcommand)]
        host_cmd: HostCommand,
    },
    /// SSH key commands
    Key {
        #[command(subcommand)]
        key_cmd: KeyCommand,
    },
    /// User management commands
    User {
        #[command(subcommand)]
        user_cmd: UserCommand,
    },
    /// Group management commands
    Group {
        #[command(subcommand)]
        group_cmd: GroupCommand,
    },
    /// Configuration commands
    Config {
        #[command(subcommand)]
        config_cmd: ConfigCommand,
    },
}

/// Host management subcommands
#[derive(Subcommand, Debug)]
pub enum HostCommand {
    /// List all hosts
    List,
    /// Show hosts by id or name
    #[command(long_about = r#"Show hosts by id or name

Each query matches a host whose numeric id or name equals it. The command
fails on the first query that matches nothing.

EXAMPLES:
    $ directoryctl host show sdf 2
    $ directoryctl host show whoami --output json"#)]
    Show {
        #[arg(value_name = "HOST", required = true)]
        queries: Vec<String>,
    },
    /// Create a host from a connection string
    #[command(long_about = r#"Create a host from a connection string

The scheme is optional: `user:pass@host:port` and `ssh://user@host` are both
accepted. Without a port the configured default port is used. The host name
defaults to the hostname part of the address.

EXAMPLES:
    $ directoryctl host create new@sdf.org
    $ directoryctl host create ssh://ops@10.0.0.5:2222 --name db --key deploy --group prod"#)]
    Create {
        /// Connection string
        url: String,
        /// Host name (defaults to the hostname)
        #[arg(short, long)]
        name: Option<String>,
        /// Key used to authenticate to the host (id or name)
        #[arg(short, long)]
        key: Option<String>,
        /// Expected host key fingerprint
        #[arg(short, long)]
        fingerprint: Option<String>,
        /// Groups to add the host to (id or name)
        #[arg(short, long = "group")]
        groups: Vec<String>,
    },
    /// Parse a connection string without touching the database
    Parse { url: String },
}

/// SSH key subcommands
#[derive(Subcommand, Debug)]
pub enum KeyCommand {
    /// List all keys
    List,
    /// Show keys by id or name
    Show {
        #[arg(value_name = "KEY", required = true)]
        queries: Vec<String>,
    },
}

/// User management subcommands
#[derive(Subcommand, Debug)]
pub enum UserCommand {
    /// Create a user
    Create { name: String },
    /// Show users by id or name, with their groups and keys
    Show {
        #[arg(value_name = "USER", required = true)]
        queries: Vec<String>,
    },
}

/// Group management subcommands
#[derive(Subcommand, Debug)]
pub enum GroupCommand {
    /// Create a group
    Create { name: String },
    /// List all groups
    List,
    /// Add hosts to a group; nothing is added unless every host resolves
    AddHosts {
        group: String,
        #[arg(value_name = "HOST", required = true)]
        hosts: Vec<String>,
    },
    /// Add users to a group; nothing is added unless every user resolves
    AddUsers {
        group: String,
        #[arg(value_name = "USER", required = true)]
        users: Vec<String>,
    },
}

/// Configuration subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the default configuration as TOML
    Sample,
    /// Print the effective configuration
    Show,
}

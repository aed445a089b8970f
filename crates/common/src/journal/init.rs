//! Journal initialization

use tracing::info;

use crate::config::LoggingConfig;

/// Initialize the journal system with tracing + journald
///
/// `RUST_LOG` takes precedence over the configured level. The journald layer
/// is only attached when enabled in config and the journal socket is reachable.
pub fn init_journal(
    config: &LoggingConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.filter_directives()))?;

    let journal_layer = if config.journald {
        tracing_journald::layer().ok()
    } else {
        None
    };
    let journald_attached = journal_layer.is_some();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(journal_layer);

    // stdout is reserved for command output
    match config.format.to_lowercase().as_str() {
        "json" => registry
            .with(fmt::layer().json().with_target(false).with_writer(std::io::stderr))
            .try_init()?,
        "compact" => registry
            .with(fmt::layer().compact().with_target(false).with_writer(std::io::stderr))
            .try_init()?,
        _ => registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()?,
    }

    if journald_attached {
        info!("Journal initialized with systemd journald");
    } else {
        info!("Journal initialized with console logging (journald not available)");
    }

    Ok(())
}

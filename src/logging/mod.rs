use crate::config::LoggingConfig;

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Log file used when file logging is enabled without an explicit path.
pub const DEFAULT_LOG_FILE: &str = "logs/hotelchat.log";

/// Install the global tracing subscriber.
///
/// `RUST_LOG` directives are honoured; the configured level is added for the
/// `hotelchat` target on top of them. Console output can be plain or JSON,
/// and an append-only file layer is added when `fileEnabled` is set.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("hotelchat={}", config.level.as_str()).parse()?);

    let console = config.console.then(|| {
        if config.json {
            fmt::layer().json().boxed()
        } else {
            fmt::layer().with_target(true).boxed()
        }
    });

    let file = if config.file_enabled {
        let path = config
            .file
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE));
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("cannot create log directory {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("cannot open log file {}", path.display()))?;
        Some(
            fmt::layer()
                .with_ansi(false)
                .with_writer(Arc::new(file))
                .boxed(),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()?;

    Ok(())
}

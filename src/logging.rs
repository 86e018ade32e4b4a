//! Structured logging setup.
//!
//! Builds the global `tracing-subscriber` registry straight from the
//! `[logging]` section of the configuration. `RUST_LOG` overrides the
//! configured level when set.

use anyhow::Result;
use serde::Deserialize;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{Layer, Registry, fmt};

use crate::config::LoggingConfig;

/// Output format of log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line, colored; for a terminal.
    #[default]
    Pretty,
    /// One JSON object per line; for log shippers.
    Json,
    /// Single line, colored.
    Compact,
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn output_layer(config: &LoggingConfig) -> BoxedLayer {
    let base = fmt::layer().with_thread_ids(config.thread_ids);
    match config.format {
        LogFormat::Pretty => base.pretty().boxed(),
        LogFormat::Json => base.json().flatten_event(true).boxed(),
        LogFormat::Compact => base.compact().boxed(),
    }
}

/// Installs the global subscriber described by `config`.
///
/// Fails on an unknown level. Returns `false` when a subscriber was already
/// installed; the existing one stays in place.
pub fn init_logging(config: &LoggingConfig) -> Result<bool> {
    let level = config.parsed_level()?;
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();

    let installed = tracing_subscriber::registry()
        .with(output_layer(config))
        .with(filter)
        .try_init()
        .is_ok();
    Ok(installed)
}

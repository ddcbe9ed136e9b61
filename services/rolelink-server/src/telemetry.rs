use crate::config::LoggingConfig;
use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
pub fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(logging.filter()));

    let registry = tracing_subscriber::registry().with(filter);

    match logging.format.to_lowercase().as_str() {
        "json" => registry.with(fmt::layer().json()).try_init(),
        "compact" => registry.with(fmt::layer().compact()).try_init(),
        _ => registry.with(fmt::layer().pretty()).try_init(),
    }
    .context("Failed to install tracing subscriber")
}

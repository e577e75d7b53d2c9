//! Tracing subscriber setup.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, PlaygroundConfig};
use crate::error::{PlaygroundError, PlaygroundResult};

/// Filter from `RUST_LOG`, falling back to the configured directives.
pub fn env_filter(config: &PlaygroundConfig) -> PlaygroundResult<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.log_filter)
            .map_err(|e| PlaygroundError::Telemetry(format!("invalid log_filter: {}", e))),
    }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init(config: &PlaygroundConfig) -> PlaygroundResult<()> {
    let registry = tracing_subscriber::registry().with(env_filter(config)?);
    let result = match config.log_format {
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
    };
    result.map_err(|e| PlaygroundError::Telemetry(e.to_string()))?;

    tracing::info!(
        log_format = ?config.log_format,
        latency_ms = config.remote_latency_ms,
        "Telemetry initialized"
    );
    Ok(())
}

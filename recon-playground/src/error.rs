//! Error types for the playground.

use recon_core::{CacheError, ConfigError, ReconError};

#[derive(Debug, thiserror::Error)]
pub enum PlaygroundError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Recon(#[from] ReconError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error("Failed to install tracing subscriber: {0}")]
    Telemetry(String),
}

pub type PlaygroundResult<T> = Result<T, PlaygroundError>;

//! Configuration loading for the playground.
//!
//! Every field has a default, so an empty file is a valid config. Unknown
//! fields are rejected.

use std::path::{Path, PathBuf};

use recon_core::ConfigError;
use recon_dispatch::DispatcherConfig;
use serde::Deserialize;

use crate::error::PlaygroundError;

/// Longest user name the user service accepts.
pub const MAX_NAME_LEN: usize = 20;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PlaygroundConfig {
    /// `EnvFilter` directives, overridden by `RUST_LOG`.
    pub log_filter: String,
    pub log_format: LogFormat,
    /// Simulated round trip of every remote call.
    pub remote_latency_ms: u64,
    /// Operation ids whose calls are rejected by the user service.
    pub fail_operations: Vec<String>,
    pub seed_users: Vec<SeedUser>,
    pub dispatcher: DispatcherConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedUser {
    pub id: String,
    pub name: String,
}

impl Default for PlaygroundConfig {
    fn default() -> Self {
        Self {
            log_filter: "recon_dispatch=debug,recon_playground=info,info".to_string(),
            log_format: LogFormat::Pretty,
            remote_latency_ms: 50,
            fail_operations: Vec::new(),
            seed_users: vec![
                SeedUser {
                    id: "u-1".to_string(),
                    name: "ada".to_string(),
                },
                SeedUser {
                    id: "u-2".to_string(),
                    name: "grace".to_string(),
                },
            ],
            dispatcher: DispatcherConfig::default(),
        }
    }
}

impl PlaygroundConfig {
    /// Load from `--config <path>` or `RECON_PLAYGROUND_CONFIG`, falling back
    /// to defaults when neither is given.
    pub fn load() -> Result<Self, PlaygroundError> {
        let config = match config_path_from_args().or_else(config_path_from_env) {
            Some(path) => Self::from_path(&path)?,
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, PlaygroundError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, PlaygroundError> {
        let config: PlaygroundConfig = toml::from_str(contents)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.log_filter.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "log_filter",
                reason: "must not be empty".to_string(),
            });
        }
        if self.remote_latency_ms > 10_000 {
            return Err(ConfigError::InvalidValue {
                field: "remote_latency_ms",
                reason: "must be <= 10000".to_string(),
            });
        }
        if self.fail_operations.iter().any(|op| op.trim().is_empty()) {
            return Err(ConfigError::InvalidValue {
                field: "fail_operations",
                reason: "entries must not be empty".to_string(),
            });
        }
        for user in &self.seed_users {
            if user.id.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "seed_users.id",
                    reason: "must not be empty".to_string(),
                });
            }
            if user.name.is_empty() || user.name.chars().count() > MAX_NAME_LEN {
                return Err(ConfigError::InvalidValue {
                    field: "seed_users.name",
                    reason: format!("must be 1 to {MAX_NAME_LEN} characters"),
                });
            }
        }
        let mut ids: Vec<&str> = self.seed_users.iter().map(|user| user.id.as_str()).collect();
        ids.sort_unstable();
        if ids.windows(2).any(|pair| pair[0] == pair[1]) {
            return Err(ConfigError::InvalidValue {
                field: "seed_users.id",
                reason: "must be unique".to_string(),
            });
        }
        self.dispatcher.validate()
    }
}

fn config_path_from_env() -> Option<PathBuf> {
    std::env::var("RECON_PLAYGROUND_CONFIG").ok().map(PathBuf::from)
}

fn config_path_from_args() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use recon_dispatch::{FailurePolicy, UnregisteredTagPolicy};

    #[test]
    fn test_empty_file_is_default() {
        let config = PlaygroundConfig::from_toml("").unwrap();
        assert_eq!(config, PlaygroundConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_full_config_parses() {
        let config = PlaygroundConfig::from_toml(
            r#"
            log_filter = "debug"
            log_format = "json"
            remote_latency_ms = 5
            fail_operations = ["example.user.delete"]

            [[seed_users]]
            id = "a"
            name = "alan"

            [dispatcher]
            on_failure = "rollback"
            on_unregistered = "warn"
            "#,
        )
        .unwrap();

        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.remote_latency_ms, 5);
        assert_eq!(config.seed_users.len(), 1);
        assert_eq!(config.dispatcher.on_failure, FailurePolicy::Rollback);
        assert_eq!(config.dispatcher.on_unregistered, UnregisteredTagPolicy::Warn);
        assert_eq!(config.dispatcher.event_capacity, 64);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result = PlaygroundConfig::from_toml("retries = 3");
        assert!(matches!(result, Err(PlaygroundError::Parse(_))));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = PlaygroundConfig::default();
        config.seed_users[0].name = "a".repeat(MAX_NAME_LEN + 1);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "seed_users.name", .. })
        ));

        let mut config = PlaygroundConfig::default();
        config.seed_users[1].id = config.seed_users[0].id.clone();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "seed_users.id", .. })
        ));

        let mut config = PlaygroundConfig::default();
        config.dispatcher.event_capacity = 0;
        assert!(config.validate().is_err());
    }
}

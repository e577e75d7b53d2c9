//! Dispatcher configuration.

use recon_core::ConfigError;
use serde::{Deserialize, Serialize};

/// What a failed remote settlement does to the cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Run the same reconciliation as a success. The reducer projects the
    /// action's logical effect even though the server rejected it.
    #[default]
    Reconcile,
    /// Restore the value that was cached when the call was issued.
    ///
    /// Overwrites every write made to the key since then, including
    /// cache-only patches and reconciliations of other dispatches.
    Rollback,
    /// Leave the cache as it is.
    Skip,
}

/// What dispatching a tag with no bound slot does.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnregisteredTagPolicy {
    /// Drop silently.
    #[default]
    Ignore,
    /// Drop and log a warning.
    Warn,
}

/// Configuration for a [`Dispatcher`](crate::Dispatcher).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct DispatcherConfig {
    pub on_failure: FailurePolicy,
    pub on_unregistered: UnregisteredTagPolicy,
    /// Buffer size of the lifecycle event channel.
    pub event_capacity: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            on_failure: FailurePolicy::Reconcile,
            on_unregistered: UnregisteredTagPolicy::Ignore,
            event_capacity: 64,
        }
    }
}

impl DispatcherConfig {
    /// Create a new dispatcher config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.on_failure = policy;
        self
    }

    pub fn with_unregistered_policy(mut self, policy: UnregisteredTagPolicy) -> Self {
        self.on_unregistered = policy;
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.event_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "event_capacity",
                reason: "must be > 0".to_string(),
            });
        }
        Ok(())
    }
}

//! Error types for RECON operations

use thiserror::Error;

/// Slot registry construction errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Registry needs at least one slot binding")]
    Empty,

    #[error("Too many slot bindings: {count} (max {max})")]
    TooManySlots { count: usize, max: usize },

    #[error("Duplicate action tag: {tag}")]
    DuplicateTag { tag: String },

    #[error("Invalid action tag {tag:?}: {reason}")]
    InvalidTag { tag: String, reason: String },

    #[error("Invalid operation for tag {tag}: {reason}")]
    InvalidOperation { tag: String, reason: String },
}

/// Remote transport errors raised while establishing mutation handles.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Unknown remote operation: {operation}")]
    UnknownOperation { operation: String },
}

/// Failure settlement of a remote operation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    #[error("Remote operation failed: {message}")]
    Failed { message: String },

    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },
}

impl RemoteError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }

    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    /// Keep a `RemoteError` as-is, flatten any other error to its message.
    pub fn from_error<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        let boxed: Box<dyn std::error::Error + Send + Sync> = Box::new(err);
        match boxed.downcast::<RemoteError>() {
            Ok(remote) => *remote,
            Err(other) => Self::failed(other.to_string()),
        }
    }
}

/// Query cache errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("No async runtime available to run a fetch for {query}")]
    RuntimeUnavailable { query: String },

    #[error("Fetch failed for {query}: {message}")]
    FetchFailed { query: String, message: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Master error type for all RECON errors.
#[derive(Debug, Clone, Error)]
pub enum ReconError {
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Dispatcher must be built inside a Tokio runtime")]
    RuntimeUnavailable,
}

/// Result type alias for RECON operations.
pub type ReconResult<T> = Result<T, ReconError>;

// =============================================================================
// TESTS
// =============================================================================

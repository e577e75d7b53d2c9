//! RECON Core - Data Types and Capability Traits
//!
//! Pure data structures and the traits at the seams of the dispatcher.
//! Nothing in this crate talks to a cache store or a transport; those are
//! injected by `recon-cache` and `recon-dispatch`.
//!
//! # Key Types
//!
//! - [`Action`]: a tagged intent with a typed payload
//! - [`CacheKey`]: `(query, input)` pair addressing one cached query result
//! - [`QuerySnapshot`]: the live view of one cache entry
//! - [`Reducer`]: pure projection `(current, action, extra) -> next`
//! - [`Mutation`]: a typed remote operation, erased to [`ErasedMutation`]

pub mod action;
pub mod error;
pub mod identity;
pub mod key;
pub mod mutation;
pub mod reducer;
pub mod snapshot;

pub use action::{Action, DispatchOptions};
pub use error::{
    CacheError, ConfigError, ReconError, ReconResult, RegistryError, RemoteError, TransportError,
};
pub use identity::{ActionTag, DispatchId, OperationId};
pub use key::CacheKey;
pub use mutation::{
    mutation_fn, ErasedMutation, FnMutation, Mutation, MutationHandle, NoopMutation, Settlement,
};
pub use reducer::Reducer;
pub use snapshot::{QuerySnapshot, QueryStatus};

use chrono::{DateTime, Utc};

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Marker for values that can live in the query cache.
///
/// Cached values are replaced wholesale on every write and shared across
/// tasks, so they must be cheap enough to clone and safe to send.
pub trait CachedValue: Clone + Send + Sync + 'static {}

impl<T> CachedValue for T where T: Clone + Send + Sync + 'static {}

//! RECON Dispatch - Mutation Slots and Optimistic Reconciliation
//!
//! A [`Dispatcher`] owns one cache key, one reducer and a fixed registry of
//! [`MAX_SLOTS`] mutation slots. Dispatching an [`Action`](recon_core::Action)
//! either patches the cache immediately (cache-only) or calls the bound
//! remote operation and reconciles once it settles:
//!
//! ```text
//! cancel in-flight fetch -> read -> reduce -> write
//! ```
//!
//! There is no refetch after a mutation. The reducer's projection is the
//! post-mutation state until something else refreshes the key.
//!
//! # Modules
//!
//! - [`registry`]: slot bindings and the fixed-size slot registry
//! - [`transport`]: how operation ids become callable handles
//! - [`reconcile`]: the reconciliation primitives
//! - [`dispatcher`]: routing, background settlement, failure policy
//! - [`events`]: lifecycle events published per dispatch

pub mod config;
pub mod dispatcher;
pub mod events;
pub mod reconcile;
pub mod registry;
pub mod transport;

pub use config::{DispatcherConfig, FailurePolicy, UnregisteredTagPolicy};
pub use dispatcher::{
    register_dispatcher, DispatchRoute, Dispatched, Dispatcher, DispatcherBuilder,
};
pub use events::DispatchEvent;
pub use reconcile::ReconcileOutcome;
pub use registry::{MutationSlot, SlotBinding, SlotRegistry, SlotRegistryBuilder, MAX_SLOTS};
pub use transport::{InProcessTransport, JsonMutation, MutationTransport};

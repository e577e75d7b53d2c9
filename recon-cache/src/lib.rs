//! RECON Cache - Query Cache Facade and In-Memory Store
//!
//! The dispatcher never owns cached data. It reaches the cache through the
//! [`QueryCache`] capability, usually wrapped in a [`CacheClient`] bound to
//! the single [`CacheKey`](recon_core::CacheKey) a view renders.
//!
//! # Reconciliation Primitives
//!
//! - `read`: synchronous snapshot read, no network effect
//! - `write`: synchronous replace, notifies subscribers
//! - `cancel_in_flight`: waits until any running fetch for the key is gone,
//!   so a late response cannot overwrite an optimistic patch
//! - `subscribe`: live snapshot receiver (status, data, error)
//!
//! [`MemoryQueryCache`] is an in-process store implementing the capability,
//! with background fetches through a [`QueryFetcher`].

pub mod client;
pub mod memory;
pub mod traits;

pub use client::CacheClient;
pub use memory::MemoryQueryCache;
pub use traits::{QueryCache, QueryFetcher, SnapshotReceiver};

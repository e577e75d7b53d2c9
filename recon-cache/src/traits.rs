//! Cache store capability and query fetcher traits.

use async_trait::async_trait;
use recon_core::{CacheKey, CachedValue, QuerySnapshot, RemoteError};
use tokio::sync::watch;

/// Receiver yielding the live snapshot of one cache entry.
pub type SnapshotReceiver<V> = watch::Receiver<QuerySnapshot<V>>;

/// Reactive query cache store.
///
/// Implementations hold `(key) -> snapshot` and notify subscribers on every
/// write. They must be safe to share across tasks.
#[async_trait]
pub trait QueryCache<V: CachedValue>: Send + Sync {
    /// Current cached data for `key`, or `None` if nothing is cached.
    fn read(&self, key: &CacheKey) -> Option<V>;

    /// Replace the cached data for `key` and notify its subscribers.
    fn write(&self, key: &CacheKey, value: V);

    /// Suspend until any fetch in flight for `key` is aborted or settled.
    ///
    /// After this returns, no fetch started before the call may write to
    /// `key`.
    async fn cancel_in_flight(&self, key: &CacheKey);

    /// Subscribe to the live snapshot of `key`.
    fn subscribe(&self, key: &CacheKey) -> SnapshotReceiver<V>;

    /// Current snapshot of `key`.
    fn snapshot(&self, key: &CacheKey) -> QuerySnapshot<V> {
        self.subscribe(key).borrow().clone()
    }
}

/// Loads the value of a query from its source of truth.
#[async_trait]
pub trait QueryFetcher<V>: Send + Sync {
    async fn fetch(&self, key: &CacheKey) -> Result<V, RemoteError>;
}

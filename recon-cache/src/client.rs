//! Cache client facade bound to one cache key.

use std::fmt;
use std::sync::Arc;

use recon_core::{CacheKey, CachedValue, QuerySnapshot};

use crate::traits::{QueryCache, SnapshotReceiver};

/// Thin adapter exposing the cache primitives for one [`CacheKey`].
pub struct CacheClient<V> {
    cache: Arc<dyn QueryCache<V>>,
    key: CacheKey,
}

impl<V> CacheClient<V> {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }
}

impl<V: CachedValue> CacheClient<V> {
    pub fn new(cache: Arc<dyn QueryCache<V>>, key: CacheKey) -> Self {
        Self { cache, key }
    }

    pub fn read(&self) -> Option<V> {
        self.cache.read(&self.key)
    }

    pub fn write(&self, value: V) {
        tracing::trace!(key = %self.key, "Writing cache entry");
        self.cache.write(&self.key, value);
    }

    pub async fn cancel_in_flight(&self) {
        self.cache.cancel_in_flight(&self.key).await;
    }

    pub fn subscribe(&self) -> SnapshotReceiver<V> {
        self.cache.subscribe(&self.key)
    }

    pub fn snapshot(&self) -> QuerySnapshot<V> {
        self.cache.snapshot(&self.key)
    }
}

impl<V> Clone for CacheClient<V> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            key: self.key.clone(),
        }
    }
}

impl<V> fmt::Debug for CacheClient<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheClient")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

//! Reconciliation protocol: cancel, read, reduce, write.

use recon_cache::CacheClient;
use recon_core::{Action, CachedValue, Reducer};
use serde::Serialize;

/// Result of one reconciliation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// The reducer's projection was written to the cache.
    Written,
    /// Nothing was cached for the key, so there was nothing to reconcile.
    SkippedAbsent,
    /// The remote call failed and the failure policy left the cache alone.
    SkippedFailed,
}

impl ReconcileOutcome {
    pub fn wrote(&self) -> bool {
        matches!(self, Self::Written)
    }
}

/// Read, reduce and write synchronously. Never called with an absent value.
pub fn patch<V, P, X>(
    cache: &CacheClient<V>,
    reducer: &dyn Reducer<V, P, X>,
    action: &Action<P>,
    extra: Option<&X>,
) -> ReconcileOutcome
where
    V: CachedValue,
{
    match cache.read() {
        Some(current) => {
            let next = reducer.reduce(&current, action, extra);
            cache.write(next);
            ReconcileOutcome::Written
        }
        None => ReconcileOutcome::SkippedAbsent,
    }
}

/// Post-settlement reconciliation.
///
/// Waits for any in-flight fetch of the key to be cancelled before reading,
/// so a fetch started before the mutation cannot overwrite the patch.
pub async fn reconcile<V, P, X>(
    cache: &CacheClient<V>,
    reducer: &dyn Reducer<V, P, X>,
    action: &Action<P>,
    extra: Option<&X>,
) -> ReconcileOutcome
where
    V: CachedValue,
    P: Sync,
    X: Sync,
{
    cache.cancel_in_flight().await;
    patch(cache, reducer, action, extra)
}

/// Put back the value cached when the remote call was issued.
///
/// Returns `false` when there was nothing cached to restore.
pub async fn restore<V: CachedValue>(cache: &CacheClient<V>, previous: Option<V>) -> bool {
    cache.cancel_in_flight().await;
    match previous {
        Some(value) => {
            cache.write(value);
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recon_cache::{MemoryQueryCache, QueryCache};
    use recon_core::CacheKey;
    use std::sync::Arc;

    fn append(current: &Vec<u32>, action: &Action<u32>, _extra: Option<&()>) -> Vec<u32> {
        let mut next = current.clone();
        next.push(action.payload);
        next
    }

    fn reducer() -> &'static dyn Reducer<Vec<u32>, u32, ()> {
        &append
    }

    fn client() -> CacheClient<Vec<u32>> {
        let store: Arc<dyn QueryCache<Vec<u32>>> = Arc::new(MemoryQueryCache::new());
        CacheClient::new(store, CacheKey::new("items.list"))
    }

    #[test]
    fn test_patch_writes_projection() {
        let cache = client();
        cache.write(vec![1]);
        let outcome = patch(&cache, reducer(), &Action::new("add", 2), None);
        assert_eq!(outcome, ReconcileOutcome::Written);
        assert_eq!(cache.read(), Some(vec![1, 2]));
    }

    #[test]
    fn test_patch_skips_absent_value() {
        let cache = client();
        let outcome = patch(&cache, reducer(), &Action::new("add", 2), None);
        assert_eq!(outcome, ReconcileOutcome::SkippedAbsent);
        assert!(!outcome.wrote());
        assert_eq!(cache.read(), None);
        assert!(cache.snapshot().is_pending());
    }

    #[tokio::test]
    async fn test_restore_writes_previous_value() {
        let cache = client();
        cache.write(vec![1, 2]);
        assert!(restore(&cache, Some(vec![1])).await);
        assert_eq!(cache.read(), Some(vec![1]));
        assert!(!restore(&cache, None).await);
        assert_eq!(cache.read(), Some(vec![1]));
    }
}

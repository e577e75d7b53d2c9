//! In-process reactive query cache.
//!
//! Each key owns a `watch` channel carrying its snapshot, the last fetcher
//! used to load it, and at most one in-flight fetch task. Fetch tasks are
//! tagged with a generation number; a task only publishes its result if it
//! is still the key's current in-flight fetch, so a fetch detached by
//! `cancel_in_flight` can never land.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use recon_core::{CacheError, CacheKey, CachedValue, QuerySnapshot, RemoteError};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::traits::{QueryCache, QueryFetcher, SnapshotReceiver};

struct InFlightFetch {
    generation: u64,
    task: JoinHandle<()>,
}

struct Entry<V> {
    sender: watch::Sender<QuerySnapshot<V>>,
    fetcher: Option<Arc<dyn QueryFetcher<V>>>,
    in_flight: Option<InFlightFetch>,
}

impl<V> Entry<V> {
    fn new() -> Self {
        let (sender, _) = watch::channel(QuerySnapshot::pending());
        Self {
            sender,
            fetcher: None,
            in_flight: None,
        }
    }
}

struct Shared<V> {
    entries: RwLock<HashMap<CacheKey, Entry<V>>>,
    next_generation: AtomicU64,
}

impl<V: CachedValue> Shared<V> {
    fn entries(&self) -> RwLockReadGuard<'_, HashMap<CacheKey, Entry<V>>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn entries_mut(&self) -> RwLockWriteGuard<'_, HashMap<CacheKey, Entry<V>>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn complete(&self, key: &CacheKey, generation: u64, result: Result<V, RemoteError>) {
        let mut entries = self.entries_mut();
        let Some(entry) = entries.get_mut(key) else {
            return;
        };
        match &entry.in_flight {
            Some(current) if current.generation == generation => {}
            _ => {
                tracing::debug!(key = %key, generation, "Discarding result of detached fetch");
                return;
            }
        }
        entry.in_flight = None;

        match result {
            Ok(value) => {
                entry.sender.send_replace(QuerySnapshot::success(value));
            }
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "Query fetch failed");
                entry
                    .sender
                    .send_modify(|snapshot| *snapshot = std::mem::take(snapshot).failed(err.to_string()));
            }
        }
    }
}

/// In-memory [`QueryCache`] with background fetching.
///
/// Cloning yields another handle to the same entries.
pub struct MemoryQueryCache<V> {
    shared: Arc<Shared<V>>,
}

impl<V: CachedValue> MemoryQueryCache<V> {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                entries: RwLock::new(HashMap::new()),
                next_generation: AtomicU64::new(1),
            }),
        }
    }

    /// Start loading `key` in the background.
    ///
    /// If a fetch is already running for `key` the call only records the
    /// fetcher for later invalidation. Must run inside a Tokio runtime.
    pub fn fetch(
        &self,
        key: &CacheKey,
        fetcher: Arc<dyn QueryFetcher<V>>,
    ) -> Result<(), CacheError> {
        let runtime = Handle::try_current().map_err(|_| CacheError::RuntimeUnavailable {
            query: key.query().to_string(),
        })?;

        let mut entries = self.shared.entries_mut();
        let entry = entries.entry(key.clone()).or_insert_with(Entry::new);
        entry.fetcher = Some(Arc::clone(&fetcher));
        if entry.in_flight.is_some() {
            tracing::debug!(key = %key, "Fetch already in flight");
            return Ok(());
        }

        let generation = self.shared.next_generation.fetch_add(1, Ordering::Relaxed);
        entry.sender.send_modify(|snapshot| snapshot.fetching = true);

        let shared = Arc::clone(&self.shared);
        let task_key = key.clone();
        // The task blocks on the entries lock until `in_flight` is recorded.
        let task = runtime.spawn(async move {
            let result = fetcher.fetch(&task_key).await;
            shared.complete(&task_key, generation, result);
        });
        entry.in_flight = Some(InFlightFetch { generation, task });
        tracing::debug!(key = %key, generation, "Fetch started");
        Ok(())
    }

    /// Cancel any running fetch for `key` and reload it with its last
    /// fetcher. Returns `false` if `key` was never fetched.
    pub async fn invalidate(&self, key: &CacheKey) -> Result<bool, CacheError> {
        self.cancel_in_flight(key).await;
        let fetcher = self
            .shared
            .entries()
            .get(key)
            .and_then(|entry| entry.fetcher.clone());
        match fetcher {
            Some(fetcher) => {
                self.fetch(key, fetcher)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn is_fetching(&self, key: &CacheKey) -> bool {
        self.shared
            .entries()
            .get(key)
            .is_some_and(|entry| entry.in_flight.is_some())
    }

    /// Number of keys with an entry.
    pub fn len(&self) -> usize {
        self.shared.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V: CachedValue> Default for MemoryQueryCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Clone for MemoryQueryCache<V> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<V: CachedValue> fmt::Debug for MemoryQueryCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryQueryCache")
            .field("entries", &self.len())
            .finish()
    }
}

#[async_trait]
impl<V: CachedValue> QueryCache<V> for MemoryQueryCache<V> {
    fn read(&self, key: &CacheKey) -> Option<V> {
        self.shared
            .entries()
            .get(key)
            .and_then(|entry| entry.sender.borrow().data.clone())
    }

    fn write(&self, key: &CacheKey, value: V) {
        let mut entries = self.shared.entries_mut();
        let entry = entries.entry(key.clone()).or_insert_with(Entry::new);
        let fetching = entry.in_flight.is_some();
        entry
            .sender
            .send_replace(QuerySnapshot::success(value).with_fetching(fetching));
    }

    async fn cancel_in_flight(&self, key: &CacheKey) {
        let detached = {
            let mut entries = self.shared.entries_mut();
            entries.get_mut(key).and_then(|entry| {
                let detached = entry.in_flight.take();
                if detached.is_some() {
                    entry.sender.send_modify(|snapshot| snapshot.fetching = false);
                }
                detached
            })
        };

        if let Some(fetch) = detached {
            fetch.task.abort();
            // Err(JoinError::Cancelled) is the expected outcome here.
            let _ = fetch.task.await;
            tracing::debug!(key = %key, generation = fetch.generation, "Cancelled in-flight fetch");
        }
    }

    fn subscribe(&self, key: &CacheKey) -> SnapshotReceiver<V> {
        let mut entries = self.shared.entries_mut();
        entries
            .entry(key.clone())
            .or_insert_with(Entry::new)
            .sender
            .subscribe()
    }

    fn snapshot(&self, key: &CacheKey) -> QuerySnapshot<V> {
        self.shared
            .entries()
            .get(key)
            .map(|entry| entry.sender.borrow().clone())
            .unwrap_or_default()
    }
}

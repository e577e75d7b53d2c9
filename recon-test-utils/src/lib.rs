//! RECON Test Utilities
//!
//! Shared test infrastructure for the RECON workspace:
//! - Recording cache that logs every primitive in call order
//! - Mock mutations and fetchers that succeed, fail, hang, or wait on a gate
//! - Item list fixtures and their reducer
//! - Proptest generators

// Re-export core types for convenience
pub use recon_cache::{CacheClient, MemoryQueryCache, QueryCache, QueryFetcher, SnapshotReceiver};
pub use recon_core::{
    Action, ActionTag, CacheKey, CachedValue, DispatchOptions, Mutation, OperationId,
    QuerySnapshot, QueryStatus, Reducer, RemoteError, Settlement,
};

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::Semaphore;

// ============================================================================
// RECORDING CACHE
// ============================================================================

/// One primitive observed by a [`RecordingCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOp {
    Read { hit: bool },
    Write,
    CancelStarted,
    CancelCompleted,
    Subscribe,
}

/// Query cache that records the order of cache primitives.
///
/// Backed by a [`MemoryQueryCache`]. `cancel_in_flight` yields to the
/// scheduler between logging its start and its completion, so a caller that
/// forgot to await it would show a read between the two.
pub struct RecordingCache<V> {
    inner: MemoryQueryCache<V>,
    ops: Mutex<Vec<CacheOp>>,
}

impl<V: CachedValue> RecordingCache<V> {
    pub fn new() -> Self {
        Self {
            inner: MemoryQueryCache::new(),
            ops: Mutex::new(Vec::new()),
        }
    }

    /// Cache seeded with `value` under `key`. The seeding write is not logged.
    pub fn seeded(key: &CacheKey, value: V) -> Self {
        let cache = Self::new();
        cache.inner.write(key, value);
        cache
    }

    pub fn inner(&self) -> &MemoryQueryCache<V> {
        &self.inner
    }

    pub fn ops(&self) -> Vec<CacheOp> {
        self.ops.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn clear(&self) {
        self.ops.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    pub fn count(&self, op: CacheOp) -> usize {
        self.ops().into_iter().filter(|seen| *seen == op).count()
    }

    fn record(&self, op: CacheOp) {
        self.ops.lock().unwrap_or_else(PoisonError::into_inner).push(op);
    }
}

impl<V: CachedValue> Default for RecordingCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<V: CachedValue> QueryCache<V> for RecordingCache<V> {
    fn read(&self, key: &CacheKey) -> Option<V> {
        let value = self.inner.read(key);
        self.record(CacheOp::Read {
            hit: value.is_some(),
        });
        value
    }

    fn write(&self, key: &CacheKey, value: V) {
        self.record(CacheOp::Write);
        self.inner.write(key, value);
    }

    async fn cancel_in_flight(&self, key: &CacheKey) {
        self.record(CacheOp::CancelStarted);
        tokio::task::yield_now().await;
        self.inner.cancel_in_flight(key).await;
        self.record(CacheOp::CancelCompleted);
    }

    fn subscribe(&self, key: &CacheKey) -> SnapshotReceiver<V> {
        self.record(CacheOp::Subscribe);
        self.inner.subscribe(key)
    }

    fn snapshot(&self, key: &CacheKey) -> QuerySnapshot<V> {
        self.inner.snapshot(key)
    }
}

// ============================================================================
// MOCK REMOTE OPERATIONS
// ============================================================================

/// Error returned by mock mutations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MockError {
    #[error("mock rejected call: {0}")]
    Rejected(String),

    #[error("mock gate closed")]
    GateClosed,
}

/// Releases calls held by a gated mock, one permit per call.
#[derive(Debug, Clone)]
pub struct MockGate {
    permits: Arc<Semaphore>,
}

impl MockGate {
    fn new() -> Self {
        Self {
            permits: Arc::new(Semaphore::new(0)),
        }
    }

    /// Let `n` waiting (or future) calls through.
    pub fn release(&self, n: usize) {
        self.permits.add_permits(n);
    }

    /// Fail every waiting and future call with [`MockError::GateClosed`].
    pub fn close(&self) {
        self.permits.close();
    }

    async fn pass(&self) -> Result<(), MockError> {
        let permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| MockError::GateClosed)?;
        permit.forget();
        Ok(())
    }
}

#[derive(Debug, Clone)]
enum Behavior {
    Succeed,
    Fail(String),
    Pending,
    Gated { gate: MockGate, fail: bool },
}

/// Mock remote operation recording every payload it receives.
///
/// Clones share the call log, so keep one clone for assertions and hand the
/// other to a transport.
pub struct MockMutation<P> {
    behavior: Behavior,
    calls: Arc<Mutex<Vec<P>>>,
    settled: Arc<AtomicUsize>,
}

impl<P> MockMutation<P> {
    fn with_behavior(behavior: Behavior) -> Self {
        Self {
            behavior,
            calls: Arc::new(Mutex::new(Vec::new())),
            settled: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn succeeding() -> Self {
        Self::with_behavior(Behavior::Succeed)
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_behavior(Behavior::Fail(message.into()))
    }

    /// Mock whose calls never resolve.
    pub fn pending() -> Self {
        Self::with_behavior(Behavior::Pending)
    }

    /// Mock whose calls succeed once the gate lets them through.
    pub fn gated() -> (Self, MockGate) {
        let gate = MockGate::new();
        let mock = Self::with_behavior(Behavior::Gated {
            gate: gate.clone(),
            fail: false,
        });
        (mock, gate)
    }

    /// Mock whose calls fail once the gate lets them through.
    pub fn gated_failing() -> (Self, MockGate) {
        let gate = MockGate::new();
        let mock = Self::with_behavior(Behavior::Gated {
            gate: gate.clone(),
            fail: true,
        });
        (mock, gate)
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Number of calls that have returned, successfully or not.
    pub fn settled_count(&self) -> usize {
        self.settled.load(Ordering::SeqCst)
    }
}

impl<P: Clone> MockMutation<P> {
    pub fn calls(&self) -> Vec<P> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl<P> Clone for MockMutation<P> {
    fn clone(&self) -> Self {
        Self {
            behavior: self.behavior.clone(),
            calls: Arc::clone(&self.calls),
            settled: Arc::clone(&self.settled),
        }
    }
}

impl<P> fmt::Debug for MockMutation<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockMutation")
            .field("behavior", &self.behavior)
            .field("calls", &self.call_count())
            .field("settled", &self.settled_count())
            .finish()
    }
}

#[async_trait]
impl<P> Mutation<P> for MockMutation<P>
where
    P: Clone + Send + 'static,
{
    type Output = ();
    type Error = MockError;

    async fn call(&self, input: P) -> Result<(), MockError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(input);

        let result = match &self.behavior {
            Behavior::Succeed => Ok(()),
            Behavior::Fail(message) => Err(MockError::Rejected(message.clone())),
            Behavior::Pending => std::future::pending().await,
            Behavior::Gated { gate, fail } => match gate.pass().await {
                Err(err) => Err(err),
                Ok(()) if *fail => Err(MockError::Rejected("gated failure".to_string())),
                Ok(()) => Ok(()),
            },
        };
        self.settled.fetch_add(1, Ordering::SeqCst);
        result
    }
}

/// Mock query fetcher returning a fixed value, optionally held by a gate.
pub struct MockFetcher<V> {
    value: V,
    gate: Option<MockGate>,
    fetches: Arc<AtomicUsize>,
}

impl<V: CachedValue> MockFetcher<V> {
    pub fn returning(value: V) -> Self {
        Self {
            value,
            gate: None,
            fetches: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Fetcher whose fetches only return once the gate lets them through.
    pub fn gated(value: V) -> (Self, MockGate) {
        let gate = MockGate::new();
        let fetcher = Self {
            value,
            gate: Some(gate.clone()),
            fetches: Arc::new(AtomicUsize::new(0)),
        };
        (fetcher, gate)
    }

    /// Number of fetches started.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl<V: CachedValue> Clone for MockFetcher<V> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            gate: self.gate.clone(),
            fetches: Arc::clone(&self.fetches),
        }
    }
}

#[async_trait]
impl<V: CachedValue> QueryFetcher<V> for MockFetcher<V> {
    async fn fetch(&self, _key: &CacheKey) -> Result<V, RemoteError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.pass().await.map_err(RemoteError::from_error)?;
        }
        Ok(self.value.clone())
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Item list fixtures used across dispatcher tests.

    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Item {
        pub id: u64,
        pub name: String,
    }

    #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct ItemList {
        pub items: Vec<Item>,
    }

    impl ItemList {
        pub fn ids(&self) -> Vec<u64> {
            self.items.iter().map(|item| item.id).collect()
        }

        pub fn contains(&self, id: u64) -> bool {
            self.items.iter().any(|item| item.id == id)
        }
    }

    /// Payload of item actions: a full item for `add`/`rename`, an id for
    /// `remove`.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(untagged)]
    pub enum ItemInput {
        Item(Item),
        Id { id: u64 },
    }

    impl ItemInput {
        pub fn id(&self) -> u64 {
            match self {
                Self::Item(item) => item.id,
                Self::Id { id } => *id,
            }
        }
    }

    pub fn item(id: u64, name: &str) -> Item {
        Item {
            id,
            name: name.to_string(),
        }
    }

    pub fn add(id: u64, name: &str) -> Action<ItemInput> {
        Action::new("add", ItemInput::Item(item(id, name)))
    }

    pub fn remove(id: u64) -> Action<ItemInput> {
        Action::new("remove", ItemInput::Id { id })
    }

    pub fn rename(id: u64, name: &str) -> Action<ItemInput> {
        Action::new("rename", ItemInput::Item(item(id, name)))
    }

    pub fn items_key() -> CacheKey {
        CacheKey::new("example.items.get")
    }

    /// `{items: [{id: 1, name: "x"}]}`
    pub fn seeded_list() -> ItemList {
        ItemList {
            items: vec![item(1, "x")],
        }
    }

    /// Reducer over [`ItemList`]. Unknown tags and mismatched payloads
    /// return the current value unchanged.
    pub fn item_reducer(
        current: &ItemList,
        action: &Action<ItemInput>,
        _extra: Option<&()>,
    ) -> ItemList {
        let mut next = current.clone();
        match (action.tag.as_str(), &action.payload) {
            ("add", ItemInput::Item(item)) => next.items.push(item.clone()),
            ("remove", input) => next.items.retain(|item| item.id != input.id()),
            ("rename", ItemInput::Item(renamed)) => {
                for item in next.items.iter_mut().filter(|item| item.id == renamed.id) {
                    item.name = renamed.name.clone();
                }
            }
            _ => {}
        }
        next
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for dispatcher inputs.

    use super::fixtures::{Item, ItemInput, ItemList};
    use super::*;
    use proptest::prelude::*;

    pub fn arb_action_tag() -> impl Strategy<Value = ActionTag> {
        "[a-z][a-z0-9_]{0,7}(\\.[a-z][a-z0-9_]{0,7}){0,2}".prop_map(ActionTag::from)
    }

    pub fn arb_item() -> impl Strategy<Value = Item> {
        (0u64..1000, "[a-z]{1,8}").prop_map(|(id, name)| Item { id, name })
    }

    pub fn arb_item_list() -> impl Strategy<Value = ItemList> {
        prop::collection::vec(arb_item(), 0..8).prop_map(|items| ItemList { items })
    }

    pub fn arb_item_input() -> impl Strategy<Value = ItemInput> {
        prop_oneof![
            arb_item().prop_map(ItemInput::Item),
            (0u64..1000).prop_map(|id| ItemInput::Id { id }),
        ]
    }

    pub fn arb_item_action() -> impl Strategy<Value = Action<ItemInput>> {
        (arb_action_tag(), arb_item_input()).prop_map(|(tag, payload)| Action::new(tag, payload))
    }

    pub fn arb_cache_key() -> impl Strategy<Value = CacheKey> {
        (
            "[a-z]{1,6}\\.[a-z]{1,6}\\.get",
            prop::option::of(0u64..100),
        )
            .prop_map(|(query, id)| match id {
                Some(id) => CacheKey::with_input(query, serde_json::json!({ "id": id })),
                None => CacheKey::new(query),
            })
    }
}

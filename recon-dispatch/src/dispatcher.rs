//! The dispatcher: action routing and cache reconciliation.
//!
//! Per dispatch call:
//!
//! ```text
//! Idle -> Resolving -> { CacheOnlyPatch | Invoking } -> Settling -> Reconciling -> Idle
//! ```
//!
//! Resolving matches the tag against the registry; an unbound tag goes
//! straight back to idle. The cache-only path patches synchronously and
//! makes no remote call. The invoking path calls the bound operation on a
//! background task and returns at once; when the call settles the task
//! cancels in-flight fetches, reads, reduces and writes.
//!
//! Dispatches for the same key are not serialised against each other: the
//! last one to settle writes last, reducing over whatever value was cached
//! at that point. Callers needing strict ordering must queue dispatches
//! themselves.

use std::fmt;
use std::sync::Arc;

use recon_cache::{CacheClient, QueryCache, SnapshotReceiver};
use recon_core::{
    Action, ActionTag, CacheKey, CachedValue, DispatchId, DispatchOptions, MutationHandle,
    QuerySnapshot, ReconError, ReconResult, Reducer,
};
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::config::{DispatcherConfig, FailurePolicy, UnregisteredTagPolicy};
use crate::events::DispatchEvent;
use crate::reconcile::{self, ReconcileOutcome};
use crate::registry::{SlotBinding, SlotRegistry, SlotRegistryBuilder};
use crate::transport::MutationTransport;

/// Where a dispatch was routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchRoute {
    /// No slot is bound to the tag. Nothing happened.
    Dropped,
    /// Patched from the current snapshot without a remote call.
    CacheOnly { outcome: ReconcileOutcome },
    /// The operation bound to `slot` was called.
    Invoked { slot: usize },
}

/// What `dispatch` hands back: the snapshot at return time and, for remote
/// dispatches, the background reconciliation task.
///
/// Dropping this does not cancel anything. The remote call and its
/// reconciliation always run to completion.
#[derive(Debug)]
pub struct Dispatched<V> {
    dispatch_id: DispatchId,
    route: DispatchRoute,
    snapshot: QuerySnapshot<V>,
    task: Option<JoinHandle<()>>,
}

impl<V> Dispatched<V> {
    fn ready(dispatch_id: DispatchId, route: DispatchRoute, snapshot: QuerySnapshot<V>) -> Self {
        Self {
            dispatch_id,
            route,
            snapshot,
            task: None,
        }
    }

    pub fn dispatch_id(&self) -> DispatchId {
        self.dispatch_id
    }

    pub fn route(&self) -> DispatchRoute {
        self.route
    }

    /// Snapshot of the cache when `dispatch` returned.
    pub fn snapshot(&self) -> &QuerySnapshot<V> {
        &self.snapshot
    }

    pub fn into_snapshot(self) -> QuerySnapshot<V> {
        self.snapshot
    }

    /// Whether a background reconciliation is still running.
    pub fn is_pending(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Wait until the background reconciliation, if any, has finished.
    ///
    /// Says nothing about whether the remote call succeeded; observe the
    /// cache snapshot or the event channel for that.
    pub async fn settled(self) -> DispatchRoute {
        if let Some(task) = self.task {
            if let Err(err) = task.await {
                tracing::error!(
                    dispatch_id = %self.dispatch_id,
                    error = %err,
                    "Reconciliation task did not complete"
                );
            }
        }
        self.route
    }
}

struct Shared<V, P, X> {
    reducer: Arc<dyn Reducer<V, P, X>>,
    cache: CacheClient<V>,
    registry: SlotRegistry<P>,
    config: DispatcherConfig,
    events: broadcast::Sender<DispatchEvent>,
    runtime: Handle,
}

impl<V, P, X> Shared<V, P, X> {
    fn publish(&self, event: DispatchEvent) {
        // Nobody listening is fine.
        let _ = self.events.send(event);
    }
}

/// Routes actions to remote operations and reconciles one cache key.
///
/// Cheap to clone; clones share the registry, cache handle and event
/// channel. The dispatcher keeps no state between dispatches.
pub struct Dispatcher<V, P, X = ()> {
    shared: Arc<Shared<V, P, X>>,
}

impl<V, P, X> Clone for Dispatcher<V, P, X> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<V, P, X> fmt::Debug for Dispatcher<V, P, X> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("key", self.shared.cache.key())
            .field("registry", &self.shared.registry)
            .field("config", &self.shared.config)
            .finish_non_exhaustive()
    }
}

impl<V, P, X> Dispatcher<V, P, X>
where
    V: CachedValue,
    P: Clone + Send + Sync + 'static,
    X: Send + Sync + 'static,
{
    pub fn builder(
        reducer: impl Reducer<V, P, X> + 'static,
        cache_key: CacheKey,
    ) -> DispatcherBuilder<V, P, X> {
        DispatcherBuilder::new(reducer, cache_key)
    }

    /// Current snapshot of the dispatcher's cache key.
    pub fn get_snapshot(&self) -> QuerySnapshot<V> {
        self.shared.cache.snapshot()
    }

    pub fn subscribe(&self) -> SnapshotReceiver<V> {
        self.shared.cache.subscribe()
    }

    /// Subscribe to dispatch lifecycle events.
    pub fn events(&self) -> broadcast::Receiver<DispatchEvent> {
        self.shared.events.subscribe()
    }

    pub fn registry(&self) -> &SlotRegistry<P> {
        &self.shared.registry
    }

    pub fn cache(&self) -> &CacheClient<V> {
        &self.shared.cache
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.shared.config
    }

    /// Dispatch with default options.
    pub fn send(&self, action: Action<P>) -> Dispatched<V> {
        self.dispatch(action, DispatchOptions::default())
    }

    /// Route `action` and reconcile the cache.
    ///
    /// Never fails and never blocks on the network. Remote outcomes surface
    /// through the cache snapshot and the event channel.
    pub fn dispatch(&self, action: Action<P>, options: DispatchOptions<X>) -> Dispatched<V> {
        let dispatch_id = DispatchId::now_v7();
        let shared = &self.shared;

        let Some(slot) = shared.registry.resolve(&action.tag) else {
            return self.drop_unregistered(dispatch_id, action.tag);
        };

        if options.only_update_cache {
            let outcome = reconcile::patch(
                &shared.cache,
                shared.reducer.as_ref(),
                &action,
                options.extra.as_ref(),
            );
            tracing::debug!(
                dispatch_id = %dispatch_id,
                tag = %action.tag,
                ?outcome,
                "Applied cache-only dispatch"
            );
            shared.publish(DispatchEvent::Patched {
                dispatch_id,
                tag: action.tag,
                outcome,
            });
            return Dispatched::ready(
                dispatch_id,
                DispatchRoute::CacheOnly { outcome },
                self.get_snapshot(),
            );
        }

        let slot_index = slot.index();
        let handle = slot.handle().clone();
        let previous = match shared.config.on_failure {
            FailurePolicy::Rollback => shared.cache.read(),
            FailurePolicy::Reconcile | FailurePolicy::Skip => None,
        };

        shared.publish(DispatchEvent::Invoked {
            dispatch_id,
            tag: action.tag.clone(),
            operation: handle.operation().clone(),
            slot: slot_index,
        });

        let span = tracing::debug_span!(
            "dispatch",
            dispatch_id = %dispatch_id,
            tag = %action.tag,
            operation = %handle.operation(),
            slot = slot_index,
        );
        let task = shared.runtime.spawn(
            settle(
                Arc::clone(shared),
                dispatch_id,
                handle,
                action,
                options.extra,
                previous,
            )
            .instrument(span),
        );

        Dispatched {
            dispatch_id,
            route: DispatchRoute::Invoked { slot: slot_index },
            snapshot: self.get_snapshot(),
            task: Some(task),
        }
    }

    fn drop_unregistered(&self, dispatch_id: DispatchId, tag: ActionTag) -> Dispatched<V> {
        if self.shared.config.on_unregistered == UnregisteredTagPolicy::Warn {
            tracing::warn!(dispatch_id = %dispatch_id, tag = %tag, "Dropping action with unregistered tag");
        }
        self.shared.publish(DispatchEvent::Dropped { dispatch_id, tag });
        Dispatched::ready(dispatch_id, DispatchRoute::Dropped, self.get_snapshot())
    }
}

/// Await settlement of one remote call, then reconcile per the failure
/// policy.
async fn settle<V, P, X>(
    shared: Arc<Shared<V, P, X>>,
    dispatch_id: DispatchId,
    handle: MutationHandle<P>,
    action: Action<P>,
    extra: Option<X>,
    previous: Option<V>,
) where
    V: CachedValue,
    P: Clone + Send + Sync + 'static,
    X: Send + Sync + 'static,
{
    let settlement = handle.invoke(action.payload.clone()).await;
    let error = settlement.error().map(ToString::to_string);
    match &error {
        Some(err) => tracing::warn!(error = %err, "Remote operation failed"),
        None => tracing::debug!("Remote operation succeeded"),
    }
    shared.publish(DispatchEvent::Settled {
        dispatch_id,
        tag: action.tag.clone(),
        succeeded: error.is_none(),
        error,
    });

    if !settlement.is_success() {
        match shared.config.on_failure {
            FailurePolicy::Reconcile => {}
            FailurePolicy::Skip => {
                tracing::debug!("Leaving cache untouched after failure");
                shared.publish(DispatchEvent::Reconciled {
                    dispatch_id,
                    tag: action.tag,
                    outcome: ReconcileOutcome::SkippedFailed,
                });
                return;
            }
            FailurePolicy::Rollback => {
                let restored = reconcile::restore(&shared.cache, previous).await;
                tracing::debug!(restored, "Rolled back after failure");
                shared.publish(DispatchEvent::RolledBack {
                    dispatch_id,
                    tag: action.tag,
                    restored,
                });
                return;
            }
        }
    }

    let outcome = reconcile::reconcile(
        &shared.cache,
        shared.reducer.as_ref(),
        &action,
        extra.as_ref(),
    )
    .await;
    if outcome == ReconcileOutcome::SkippedAbsent {
        tracing::debug!("No cached value to reconcile");
    }
    shared.publish(DispatchEvent::Reconciled {
        dispatch_id,
        tag: action.tag,
        outcome,
    });
}

// ============================================================================
// CONSTRUCTION
// ============================================================================

/// Builds a [`Dispatcher`] from a reducer, a cache key and slot bindings.
pub struct DispatcherBuilder<V, P, X = ()> {
    reducer: Arc<dyn Reducer<V, P, X>>,
    cache_key: CacheKey,
    slots: SlotRegistryBuilder,
    config: DispatcherConfig,
}

impl<V, P, X> DispatcherBuilder<V, P, X>
where
    V: CachedValue,
    P: Clone + Send + Sync + 'static,
    X: Send + Sync + 'static,
{
    pub fn new(reducer: impl Reducer<V, P, X> + 'static, cache_key: CacheKey) -> Self {
        Self {
            reducer: Arc::new(reducer),
            cache_key,
            slots: SlotRegistryBuilder::new(),
            config: DispatcherConfig::default(),
        }
    }

    pub fn bind(
        mut self,
        tag: impl Into<ActionTag>,
        operation: impl Into<recon_core::OperationId>,
    ) -> Self {
        self.slots = self.slots.bind(tag, operation);
        self
    }

    pub fn bind_same(mut self, path: &str) -> Self {
        self.slots = self.slots.bind_same(path);
        self
    }

    pub fn bindings(mut self, bindings: impl IntoIterator<Item = SlotBinding>) -> Self {
        self.slots = self.slots.bindings(bindings);
        self
    }

    pub fn config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    /// Validate, subscribe every slot and capture the current runtime.
    pub fn build(
        self,
        cache: Arc<dyn QueryCache<V>>,
        transport: &dyn MutationTransport<P>,
    ) -> ReconResult<Dispatcher<V, P, X>> {
        self.config.validate()?;
        let runtime = Handle::try_current().map_err(|_| ReconError::RuntimeUnavailable)?;
        let registry = self.slots.build(transport)?;
        let (events, _) = broadcast::channel(self.config.event_capacity);

        tracing::debug!(
            key = %self.cache_key,
            slots = registry.bound_count(),
            "Registered dispatcher"
        );

        Ok(Dispatcher {
            shared: Arc::new(Shared {
                reducer: self.reducer,
                cache: CacheClient::new(cache, self.cache_key),
                registry,
                config: self.config,
                events,
                runtime,
            }),
        })
    }
}

/// Register a dispatcher with default configuration.
///
/// `bindings` must hold between one and five distinct tags.
pub fn register_dispatcher<V, P, X>(
    reducer: impl Reducer<V, P, X> + 'static,
    cache_key: CacheKey,
    bindings: impl IntoIterator<Item = SlotBinding>,
    cache: Arc<dyn QueryCache<V>>,
    transport: &dyn MutationTransport<P>,
) -> ReconResult<Dispatcher<V, P, X>>
where
    V: CachedValue,
    P: Clone + Send + Sync + 'static,
    X: Send + Sync + 'static,
{
    DispatcherBuilder::new(reducer, cache_key)
        .bindings(bindings)
        .build(cache, transport)
}

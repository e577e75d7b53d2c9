//! Dispatcher behaviour against recording caches and mock remote operations.

use std::io;
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::future::join_all;
use recon_dispatch::{
    DispatchEvent, DispatchRoute, Dispatcher, DispatcherBuilder, DispatcherConfig, FailurePolicy,
    InProcessTransport, ReconcileOutcome, UnregisteredTagPolicy,
};
use recon_test_utils::fixtures::*;
use recon_test_utils::*;
use tokio::sync::broadcast;

// ============================================================================
// HELPERS
// ============================================================================

const CREATE: &str = "example.items.create";
const RENAME: &str = "example.items.rename";

fn dispatcher_with(
    cache: Arc<dyn QueryCache<ItemList>>,
    create: MockMutation<ItemInput>,
    config: DispatcherConfig,
) -> Dispatcher<ItemList, ItemInput> {
    let transport = InProcessTransport::new().route(CREATE, create);
    DispatcherBuilder::new(item_reducer, items_key())
        .bind("add", CREATE)
        .config(config)
        .build(cache, &transport)
        .unwrap()
}

fn recording(value: Option<ItemList>) -> Arc<RecordingCache<ItemList>> {
    match value {
        Some(value) => Arc::new(RecordingCache::seeded(&items_key(), value)),
        None => Arc::new(RecordingCache::new()),
    }
}

fn drain(events: &mut broadcast::Receiver<DispatchEvent>) -> Vec<DispatchEvent> {
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    seen
}

/// Log sink shared between a test and its fmt subscriber.
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    fn contents(&self) -> String {
        let bytes = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn position(ops: &[CacheOp], op: CacheOp) -> usize {
    ops.iter().position(|seen| *seen == op).unwrap()
}

// ============================================================================
// SCENARIOS
// ============================================================================

#[tokio::test]
async fn test_add_reconciles_after_settlement() {
    let cache = recording(Some(ItemList::default()));
    let create = MockMutation::succeeding();
    let dispatcher = dispatcher_with(cache.clone(), create.clone(), DispatcherConfig::default());

    let dispatched = dispatcher.send(add(1, "x"));
    assert_eq!(dispatched.route(), DispatchRoute::Invoked { slot: 0 });
    dispatched.settled().await;

    assert_eq!(
        dispatcher.get_snapshot().data,
        Some(ItemList {
            items: vec![item(1, "x")]
        })
    );
    assert_eq!(create.calls(), vec![ItemInput::Item(item(1, "x"))]);
}

#[tokio::test]
async fn test_unregistered_tag_leaves_cache_unchanged() {
    let cache = recording(Some(seeded_list()));
    let create = MockMutation::succeeding();
    let dispatcher = dispatcher_with(cache.clone(), create.clone(), DispatcherConfig::default());

    let dispatched = dispatcher.send(remove(1));
    assert_eq!(dispatched.route(), DispatchRoute::Dropped);
    dispatched.settled().await;

    assert_eq!(dispatcher.get_snapshot().data, Some(seeded_list()));
    assert_eq!(create.call_count(), 0);
    assert_eq!(cache.count(CacheOp::Write), 0);
}

#[tokio::test]
async fn test_warn_policy_logs_and_drops_unregistered_tag() {
    let logs = LogBuffer::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::WARN)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let cache = recording(Some(seeded_list()));
    let create = MockMutation::succeeding();
    let config = DispatcherConfig::new().with_unregistered_policy(UnregisteredTagPolicy::Warn);
    let dispatcher = dispatcher_with(cache.clone(), create.clone(), config);
    let mut events = dispatcher.events();

    let dispatched = dispatcher.send(remove(1));
    let dispatch_id = dispatched.dispatch_id();
    assert_eq!(dispatched.route(), DispatchRoute::Dropped);
    dispatched.settled().await;

    let seen = drain(&mut events);
    assert_eq!(seen.len(), 1);
    assert!(matches!(&seen[0], DispatchEvent::Dropped { tag, .. } if tag.as_str() == "remove"));
    assert_eq!(seen[0].dispatch_id(), dispatch_id);
    assert_eq!(cache.count(CacheOp::Write), 0);
    assert_eq!(create.call_count(), 0);
    assert_eq!(dispatcher.get_snapshot().data, Some(seeded_list()));

    let output = logs.contents();
    assert!(output.contains("WARN"));
    assert!(output.contains("Dropping action with unregistered tag"));
    assert!(output.contains("remove"));
}

#[tokio::test]
async fn test_ignore_policy_drops_without_warning() {
    let logs = LogBuffer::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::WARN)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let cache = recording(Some(seeded_list()));
    let dispatcher = dispatcher_with(cache.clone(), MockMutation::succeeding(), DispatcherConfig::default());

    assert_eq!(dispatcher.send(remove(1)).route(), DispatchRoute::Dropped);
    assert!(!logs.contents().contains("unregistered tag"));
}

#[tokio::test]
async fn test_cache_only_dispatch_is_synchronous() {
    let cache = recording(Some(seeded_list()));
    let create = MockMutation::pending();
    let dispatcher = dispatcher_with(cache.clone(), create.clone(), DispatcherConfig::default());

    let dispatched = dispatcher.dispatch(add(2, "y"), DispatchOptions::cache_only());

    assert_eq!(
        dispatched.route(),
        DispatchRoute::CacheOnly {
            outcome: ReconcileOutcome::Written
        }
    );
    assert!(!dispatched.is_pending());
    let snapshot = dispatched.into_snapshot();
    assert_eq!(snapshot.data.map(|list| list.ids()), Some(vec![1, 2]));
    assert_eq!(create.call_count(), 0);
    assert_eq!(cache.count(CacheOp::CancelStarted), 0);
    assert_eq!(cache.count(CacheOp::Write), 1);
}

#[tokio::test]
async fn test_cache_only_with_absent_value_does_nothing() {
    let cache = recording(None);
    let dispatcher = dispatcher_with(cache.clone(), MockMutation::pending(), DispatcherConfig::default());

    let dispatched = dispatcher.dispatch(add(2, "y"), DispatchOptions::cache_only());
    assert_eq!(
        dispatched.route(),
        DispatchRoute::CacheOnly {
            outcome: ReconcileOutcome::SkippedAbsent
        }
    );
    assert_eq!(cache.count(CacheOp::Write), 0);
    assert!(dispatcher.get_snapshot().is_pending());
}

// ============================================================================
// RECONCILIATION ORDERING
// ============================================================================

#[tokio::test]
async fn test_cancel_completes_before_reconciling_write() {
    let cache = recording(Some(seeded_list()));
    let dispatcher = dispatcher_with(cache.clone(), MockMutation::succeeding(), DispatcherConfig::default());

    let (fetcher, fetch_gate) = MockFetcher::gated(ItemList::default());
    cache.inner().fetch(&items_key(), Arc::new(fetcher.clone())).unwrap();
    assert!(cache.inner().is_fetching(&items_key()));
    cache.clear();

    dispatcher.send(add(2, "y")).settled().await;

    let ops = cache.ops();
    assert!(position(&ops, CacheOp::CancelStarted) < position(&ops, CacheOp::CancelCompleted));
    assert!(position(&ops, CacheOp::CancelCompleted) < position(&ops, CacheOp::Read { hit: true }));
    assert!(position(&ops, CacheOp::Read { hit: true }) < position(&ops, CacheOp::Write));
    assert!(!cache.inner().is_fetching(&items_key()));
    assert_eq!(fetcher.fetch_count(), 1);

    // The stale fetch was aborted; letting it through changes nothing.
    fetch_gate.release(1);
    tokio::task::yield_now().await;
    assert_eq!(dispatcher.get_snapshot().data.map(|list| list.ids()), Some(vec![1, 2]));
}

#[tokio::test]
async fn test_reconciliation_follows_settlement_order() {
    let cache: Arc<dyn QueryCache<ItemList>> = recording(Some(seeded_list()));
    let (create, create_gate) = MockMutation::<ItemInput>::gated();
    let (rename_op, rename_gate) = MockMutation::<ItemInput>::gated();
    let transport = InProcessTransport::new()
        .route(CREATE, create)
        .route(RENAME, rename_op);
    let dispatcher: Dispatcher<ItemList, ItemInput> = DispatcherBuilder::new(item_reducer, items_key())
        .bind("add", CREATE)
        .bind("rename", RENAME)
        .build(cache, &transport)
        .unwrap();

    let first = dispatcher.send(add(2, "y"));
    let second = dispatcher.send(rename(1, "z"));
    assert!(first.is_pending() || second.is_pending());

    rename_gate.release(1);
    second.settled().await;
    let snapshot = dispatcher.get_snapshot().data.unwrap();
    assert_eq!(snapshot.ids(), vec![1]);
    assert_eq!(snapshot.items[0].name, "z");

    create_gate.release(1);
    first.settled().await;
    let snapshot = dispatcher.get_snapshot().data.unwrap();
    assert_eq!(snapshot.ids(), vec![1, 2]);
    assert_eq!(snapshot.items[0].name, "z");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_dispatches_all_settle() {
    let cache = recording(Some(seeded_list()));
    let create = MockMutation::succeeding();
    let dispatcher = dispatcher_with(cache.clone(), create.clone(), DispatcherConfig::default());

    let dispatches: Vec<_> = (2..10).map(|id| dispatcher.send(add(id, "n"))).collect();
    let routes = join_all(dispatches.into_iter().map(|dispatched| dispatched.settled())).await;

    assert!(routes.iter().all(|route| matches!(route, DispatchRoute::Invoked { .. })));
    assert_eq!(create.call_count(), 8);
    assert_eq!(create.settled_count(), 8);

    // Last writer wins: concurrent reconciliations may overwrite each other,
    // but every write builds on a value that held the seed.
    let list = dispatcher.get_snapshot().data.unwrap();
    assert!(list.contains(1));
    assert!(list.items.len() >= 2);
}

// ============================================================================
// FAILURE POLICIES
// ============================================================================

#[tokio::test]
async fn test_failure_still_reconciles_by_default() {
    let cache = recording(Some(seeded_list()));
    let dispatcher = dispatcher_with(cache.clone(), MockMutation::failing("conflict"), DispatcherConfig::default());
    let mut events = dispatcher.events();

    let dispatched = dispatcher.send(add(2, "y"));
    let dispatch_id = dispatched.dispatch_id();
    dispatched.settled().await;

    assert_eq!(dispatcher.get_snapshot().data.map(|list| list.ids()), Some(vec![1, 2]));

    let seen = drain(&mut events);
    assert_eq!(seen.len(), 3);
    assert!(seen.iter().all(|event| event.dispatch_id() == dispatch_id));
    assert!(matches!(
        &seen[1],
        DispatchEvent::Settled { succeeded: false, error: Some(message), .. } if message.contains("conflict")
    ));
    assert!(matches!(
        seen[2],
        DispatchEvent::Reconciled {
            outcome: ReconcileOutcome::Written,
            ..
        }
    ));
}

#[tokio::test]
async fn test_closed_gate_failure_still_reconciles() {
    let cache = recording(Some(seeded_list()));
    let (create, gate) = MockMutation::<ItemInput>::gated();
    let dispatcher = dispatcher_with(cache.clone(), create.clone(), DispatcherConfig::default());
    let mut events = dispatcher.events();

    let dispatched = dispatcher.send(add(2, "y"));
    gate.close();
    dispatched.settled().await;

    assert_eq!(create.settled_count(), 1);
    assert_eq!(dispatcher.get_snapshot().data.map(|list| list.ids()), Some(vec![1, 2]));
    assert!(drain(&mut events).iter().any(|event| matches!(
        event,
        DispatchEvent::Settled { succeeded: false, error: Some(message), .. } if message.contains("gate closed")
    )));
}

#[tokio::test]
async fn test_absent_value_skips_write() {
    let cache = recording(None);
    let dispatcher = dispatcher_with(cache.clone(), MockMutation::succeeding(), DispatcherConfig::default());
    let mut events = dispatcher.events();

    dispatcher.send(add(2, "y")).settled().await;

    assert_eq!(cache.count(CacheOp::Read { hit: false }), 1);
    assert_eq!(cache.count(CacheOp::Write), 0);
    assert!(dispatcher.get_snapshot().data.is_none());
    assert!(matches!(
        drain(&mut events).last(),
        Some(DispatchEvent::Reconciled {
            outcome: ReconcileOutcome::SkippedAbsent,
            ..
        })
    ));
}

#[tokio::test]
async fn test_rollback_policy_restores_issue_time_value() {
    let cache = recording(Some(seeded_list()));
    let (create, gate) = MockMutation::gated_failing();
    let config = DispatcherConfig::new().with_failure_policy(FailurePolicy::Rollback);
    let dispatcher = dispatcher_with(cache.clone(), create, config);

    let dispatched = dispatcher.send(add(2, "y"));
    dispatcher.dispatch(add(3, "z"), DispatchOptions::cache_only());
    gate.release(1);
    dispatched.settled().await;

    // The cache-only patch made in between is overwritten as well.
    assert_eq!(dispatcher.get_snapshot().data, Some(seeded_list()));
}

#[tokio::test]
async fn test_skip_policy_leaves_cache_untouched() {
    let cache = recording(Some(seeded_list()));
    let config = DispatcherConfig::new().with_failure_policy(FailurePolicy::Skip);
    let dispatcher = dispatcher_with(cache.clone(), MockMutation::failing("nope"), config);
    let mut events = dispatcher.events();

    dispatcher.send(add(2, "y")).settled().await;

    assert_eq!(dispatcher.get_snapshot().data, Some(seeded_list()));
    assert_eq!(cache.count(CacheOp::Write), 0);
    let last = drain(&mut events).pop().unwrap();
    assert!(last.is_terminal());
    assert!(matches!(
        last,
        DispatchEvent::Reconciled {
            outcome: ReconcileOutcome::SkippedFailed,
            ..
        }
    ));
}

// ============================================================================
// OBSERVATION
// ============================================================================

#[tokio::test]
async fn test_subscribers_see_reconciled_value() {
    let cache = recording(Some(seeded_list()));
    let dispatcher = dispatcher_with(cache.clone(), MockMutation::succeeding(), DispatcherConfig::default());
    let mut snapshots = dispatcher.subscribe();
    snapshots.borrow_and_update();

    dispatcher.send(add(2, "y"));
    snapshots.changed().await.unwrap();

    let snapshot = snapshots.borrow().clone();
    assert_eq!(snapshot.status, QueryStatus::Success);
    assert_eq!(snapshot.data.map(|list| list.ids()), Some(vec![1, 2]));
}

#[tokio::test]
async fn test_event_sequence_for_successful_dispatch() {
    let cache = recording(Some(seeded_list()));
    let dispatcher = dispatcher_with(cache.clone(), MockMutation::succeeding(), DispatcherConfig::default());
    let mut events = dispatcher.events();

    dispatcher.send(add(2, "y")).settled().await;

    let seen = drain(&mut events);
    assert!(matches!(seen[0], DispatchEvent::Invoked { slot: 0, .. }));
    assert!(matches!(seen[1], DispatchEvent::Settled { succeeded: true, error: None, .. }));
    assert!(matches!(
        seen[2],
        DispatchEvent::Reconciled {
            outcome: ReconcileOutcome::Written,
            ..
        }
    ));
    assert!(seen.iter().all(|event| event.tag().as_str() == "add"));
    assert!(!seen[0].is_terminal());
    assert!(seen[2].is_terminal());
}

#[tokio::test]
async fn test_debug_output_names_key_and_bound_operations() {
    let cache = recording(Some(seeded_list()));
    let dispatcher = dispatcher_with(cache, MockMutation::succeeding(), DispatcherConfig::default());

    let rendered = format!("{dispatcher:?}");
    assert!(rendered.contains("example.items.get"));
    assert!(rendered.contains(CREATE));
    assert!(rendered.contains("__unbound"));

    let slot = &dispatcher.registry().slots()[0];
    assert_eq!(slot.operation().as_str(), CREATE);
    assert!(format!("{slot:?}").contains(CREATE));
}

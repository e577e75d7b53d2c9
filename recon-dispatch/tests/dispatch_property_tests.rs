//! Property-Based Tests for Dispatch Routing
//!
//! - Dispatching an unregistered tag leaves the cached value byte-for-byte
//!   unchanged, whatever the options.
//! - A cache-only dispatch equals one application of the reducer and never
//!   reaches the remote operation.
//! - A registry always holds exactly five slots.

use std::sync::Arc;

use proptest::prelude::*;
use recon_dispatch::{
    DispatchRoute, Dispatcher, DispatcherBuilder, InProcessTransport, SlotRegistryBuilder,
    MAX_SLOTS,
};
use recon_test_utils::fixtures::*;
use recon_test_utils::generators::*;
use recon_test_utils::*;
use tokio::runtime::Runtime;

// ============================================================================
// TEST CONFIGURATION
// ============================================================================

fn test_runtime() -> Result<Runtime, TestCaseError> {
    Runtime::new().map_err(|e| TestCaseError::fail(format!("Failed to create runtime: {}", e)))
}

fn seeded_dispatcher(
    key: CacheKey,
    list: ItemList,
    create: MockMutation<ItemInput>,
) -> Result<Dispatcher<ItemList, ItemInput>, TestCaseError> {
    let cache: Arc<dyn QueryCache<ItemList>> = Arc::new(RecordingCache::seeded(&key, list));
    let transport = InProcessTransport::new().route("example.items.create", create);
    DispatcherBuilder::new(item_reducer, key)
        .bind("add", "example.items.create")
        .build(cache, &transport)
        .map_err(|e| TestCaseError::fail(format!("Failed to build dispatcher: {}", e)))
}

// ============================================================================
// PROPERTIES
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_unregistered_tag_is_identity(
        list in arb_item_list(),
        action in arb_item_action(),
        only_update_cache in any::<bool>(),
    ) {
        prop_assume!(action.tag.as_str() != "add");

        let rt = test_runtime()?;
        rt.block_on(async {
            let create = MockMutation::succeeding();
            let dispatcher = seeded_dispatcher(items_key(), list, create.clone())?;
            let before = serde_json::to_vec(&dispatcher.get_snapshot().data)
                .map_err(|e| TestCaseError::fail(e.to_string()))?;

            let options = DispatchOptions::new().with_only_update_cache(only_update_cache);
            let dispatched = dispatcher.dispatch(action, options);
            prop_assert_eq!(dispatched.route(), DispatchRoute::Dropped);
            dispatched.settled().await;

            let after = serde_json::to_vec(&dispatcher.get_snapshot().data)
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
            prop_assert_eq!(before, after);
            prop_assert_eq!(create.call_count(), 0);
            Ok(())
        })?;
    }

    #[test]
    fn prop_cache_only_applies_reducer_once(
        key in arb_cache_key(),
        list in arb_item_list(),
        new_item in arb_item(),
    ) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let create = MockMutation::pending();
            let dispatcher = seeded_dispatcher(key, list.clone(), create.clone())?;
            let action = Action::new("add", ItemInput::Item(new_item));
            let expected = item_reducer(&list, &action, None);

            let dispatched = dispatcher.dispatch(action, DispatchOptions::cache_only());

            prop_assert_eq!(dispatched.into_snapshot().data, Some(expected));
            prop_assert_eq!(create.call_count(), 0);
            Ok(())
        })?;
    }

    #[test]
    fn prop_registry_always_has_five_slots(bound in 1usize..=MAX_SLOTS) {
        let builder = (0..bound).fold(SlotRegistryBuilder::new(), |builder, i| {
            builder.bind(format!("items.op{i}").as_str(), "example.items.create")
        });
        let transport = InProcessTransport::<ItemInput>::new()
            .route("example.items.create", MockMutation::succeeding());
        let registry = builder
            .build::<ItemInput>(&transport)
            .map_err(|e| TestCaseError::fail(e.to_string()))?;

        prop_assert_eq!(registry.slots().len(), MAX_SLOTS);
        prop_assert_eq!(registry.bound_count(), bound);
        prop_assert_eq!(transport.subscription_count(), bound);
        for slot in &registry.slots()[bound..] {
            prop_assert!(slot.operation().is_sentinel());
        }
    }
}

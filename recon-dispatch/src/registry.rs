//! Mutation slot registry.
//!
//! A registry always holds exactly [`MAX_SLOTS`] slots. Bound slots carry a
//! live handle from the transport; the rest are bound to the sentinel
//! operation and never resolve. The slot set is fixed once built.

use std::collections::HashSet;
use std::fmt;

use recon_core::{ActionTag, MutationHandle, OperationId, ReconResult, RegistryError};
use serde::{Deserialize, Serialize};

use crate::transport::MutationTransport;

/// Number of slots every registry instantiates.
pub const MAX_SLOTS: usize = 5;

/// Binding from an action tag to a remote operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotBinding {
    pub tag: ActionTag,
    pub operation: OperationId,
}

impl SlotBinding {
    pub fn new(tag: impl Into<ActionTag>, operation: impl Into<OperationId>) -> Self {
        Self {
            tag: tag.into(),
            operation: operation.into(),
        }
    }

    /// Binding whose tag is the operation's own path.
    pub fn same(path: &str) -> Self {
        Self::new(path, path)
    }
}

/// One registry slot.
pub struct MutationSlot<P> {
    index: usize,
    tag: Option<ActionTag>,
    handle: MutationHandle<P>,
}

impl<P> MutationSlot<P> {
    pub fn index(&self) -> usize {
        self.index
    }

    /// Tag routed to this slot, `None` for sentinel slots.
    pub fn tag(&self) -> Option<&ActionTag> {
        self.tag.as_ref()
    }

    pub fn operation(&self) -> &OperationId {
        self.handle.operation()
    }

    pub fn handle(&self) -> &MutationHandle<P> {
        &self.handle
    }

    pub fn is_bound(&self) -> bool {
        self.tag.is_some()
    }
}

impl<P> fmt::Debug for MutationSlot<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationSlot")
            .field("index", &self.index)
            .field("tag", &self.tag)
            .field("operation", self.handle.operation())
            .finish()
    }
}

/// Fixed set of mutation slots.
pub struct SlotRegistry<P> {
    slots: Vec<MutationSlot<P>>,
}

impl<P: Send + 'static> SlotRegistry<P> {
    /// Build a registry from bindings, subscribing each through `transport`.
    pub fn from_bindings(
        bindings: impl IntoIterator<Item = SlotBinding>,
        transport: &dyn MutationTransport<P>,
    ) -> ReconResult<Self> {
        SlotRegistryBuilder::new().bindings(bindings).build(transport)
    }

    /// Slot bound to `tag`, if any.
    pub fn resolve(&self, tag: &ActionTag) -> Option<&MutationSlot<P>> {
        self.slots
            .iter()
            .find(|slot| slot.tag.as_ref() == Some(tag))
    }

    /// All slots, sentinels included. Always [`MAX_SLOTS`] long.
    pub fn slots(&self) -> &[MutationSlot<P>] {
        &self.slots
    }

    pub fn bound(&self) -> impl Iterator<Item = &MutationSlot<P>> {
        self.slots.iter().filter(|slot| slot.is_bound())
    }

    pub fn tags(&self) -> impl Iterator<Item = &ActionTag> {
        self.slots.iter().filter_map(|slot| slot.tag.as_ref())
    }

    pub fn bound_count(&self) -> usize {
        self.bound().count()
    }
}

impl<P> fmt::Debug for SlotRegistry<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.slots.iter()).finish()
    }
}

/// Collects slot bindings, then validates and subscribes them in one go.
#[derive(Debug, Clone, Default)]
pub struct SlotRegistryBuilder {
    bindings: Vec<SlotBinding>,
}

impl SlotRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(self, tag: impl Into<ActionTag>, operation: impl Into<OperationId>) -> Self {
        self.binding(SlotBinding::new(tag, operation))
    }

    pub fn bind_same(self, path: &str) -> Self {
        self.binding(SlotBinding::same(path))
    }

    pub fn binding(mut self, binding: SlotBinding) -> Self {
        self.bindings.push(binding);
        self
    }

    pub fn bindings(mut self, bindings: impl IntoIterator<Item = SlotBinding>) -> Self {
        self.bindings.extend(bindings);
        self
    }

    /// Check slot count, tag syntax, tag uniqueness and operation ids.
    pub fn validate(&self) -> Result<(), RegistryError> {
        if self.bindings.is_empty() {
            return Err(RegistryError::Empty);
        }
        if self.bindings.len() > MAX_SLOTS {
            return Err(RegistryError::TooManySlots {
                count: self.bindings.len(),
                max: MAX_SLOTS,
            });
        }

        let mut seen = HashSet::with_capacity(self.bindings.len());
        for binding in &self.bindings {
            if !binding.tag.is_valid() {
                return Err(RegistryError::InvalidTag {
                    tag: binding.tag.to_string(),
                    reason: "expected a dotted path like `items.create`".to_string(),
                });
            }
            if binding.operation.as_str().trim().is_empty() {
                return Err(RegistryError::InvalidOperation {
                    tag: binding.tag.to_string(),
                    reason: "operation id must not be empty".to_string(),
                });
            }
            if binding.operation.is_sentinel() {
                return Err(RegistryError::InvalidOperation {
                    tag: binding.tag.to_string(),
                    reason: "the sentinel operation cannot be bound".to_string(),
                });
            }
            if !seen.insert(&binding.tag) {
                return Err(RegistryError::DuplicateTag {
                    tag: binding.tag.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Validate the bindings and instantiate all [`MAX_SLOTS`] slots.
    pub fn build<P: Send + 'static>(
        self,
        transport: &dyn MutationTransport<P>,
    ) -> ReconResult<SlotRegistry<P>> {
        self.validate()?;

        let mut bindings = self.bindings.into_iter();
        let mut slots = Vec::with_capacity(MAX_SLOTS);
        for index in 0..MAX_SLOTS {
            let slot = match bindings.next() {
                Some(binding) => {
                    let handle = transport.subscribe(&binding.operation)?;
                    tracing::debug!(
                        slot = index,
                        tag = %binding.tag,
                        operation = %binding.operation,
                        "Bound mutation slot"
                    );
                    MutationSlot {
                        index,
                        tag: Some(binding.tag),
                        handle,
                    }
                }
                None => MutationSlot {
                    index,
                    tag: None,
                    handle: MutationHandle::sentinel(),
                },
            };
            slots.push(slot);
        }
        Ok(SlotRegistry { slots })
    }
}

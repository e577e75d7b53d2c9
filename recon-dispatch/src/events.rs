//! Dispatch lifecycle events.
//!
//! Published on a broadcast channel so callers can observe remote failures
//! and reconciliation results without awaiting the dispatch itself.

use recon_core::{ActionTag, DispatchId, OperationId};
use serde::Serialize;

use crate::reconcile::ReconcileOutcome;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DispatchEvent {
    /// No slot is bound to the tag.
    Dropped {
        dispatch_id: DispatchId,
        tag: ActionTag,
    },
    /// Cache-only dispatch applied without a remote call.
    Patched {
        dispatch_id: DispatchId,
        tag: ActionTag,
        outcome: ReconcileOutcome,
    },
    /// Remote operation called.
    Invoked {
        dispatch_id: DispatchId,
        tag: ActionTag,
        operation: OperationId,
        slot: usize,
    },
    /// Remote operation settled.
    Settled {
        dispatch_id: DispatchId,
        tag: ActionTag,
        succeeded: bool,
        error: Option<String>,
    },
    /// Post-settlement reconciliation finished.
    Reconciled {
        dispatch_id: DispatchId,
        tag: ActionTag,
        outcome: ReconcileOutcome,
    },
    /// Cache restored after a failed settlement.
    RolledBack {
        dispatch_id: DispatchId,
        tag: ActionTag,
        restored: bool,
    },
}

impl DispatchEvent {
    pub fn dispatch_id(&self) -> DispatchId {
        match self {
            Self::Dropped { dispatch_id, .. }
            | Self::Patched { dispatch_id, .. }
            | Self::Invoked { dispatch_id, .. }
            | Self::Settled { dispatch_id, .. }
            | Self::Reconciled { dispatch_id, .. }
            | Self::RolledBack { dispatch_id, .. } => *dispatch_id,
        }
    }

    pub fn tag(&self) -> &ActionTag {
        match self {
            Self::Dropped { tag, .. }
            | Self::Patched { tag, .. }
            | Self::Invoked { tag, .. }
            | Self::Settled { tag, .. }
            | Self::Reconciled { tag, .. }
            | Self::RolledBack { tag, .. } => tag,
        }
    }

    /// Whether this is the last event a dispatch will publish.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Invoked { .. } | Self::Settled { .. })
    }
}

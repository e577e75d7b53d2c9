//! Remote operation transport seam.
//!
//! The registry establishes one subscription per bound slot through a
//! [`MutationTransport`]. [`InProcessTransport`] routes operation ids to
//! mutations living in the same process; [`JsonMutation`] puts a typed
//! input behind a JSON payload boundary.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use recon_core::{Mutation, MutationHandle, OperationId, RemoteError, TransportError};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Source of live mutation handles.
pub trait MutationTransport<P>: Send + Sync {
    /// Establish a handle for `operation`.
    fn subscribe(&self, operation: &OperationId) -> Result<MutationHandle<P>, TransportError>;
}

/// Transport routing operation ids to in-process mutations.
pub struct InProcessTransport<P> {
    routes: HashMap<OperationId, MutationHandle<P>>,
    subscriptions: AtomicUsize,
}

impl<P: Send + 'static> InProcessTransport<P> {
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
            subscriptions: AtomicUsize::new(0),
        }
    }

    /// Route `operation` to `mutation`, replacing any earlier route.
    pub fn route(
        mut self,
        operation: impl Into<OperationId>,
        mutation: impl Mutation<P> + 'static,
    ) -> Self {
        self.insert(operation, mutation);
        self
    }

    pub fn insert(&mut self, operation: impl Into<OperationId>, mutation: impl Mutation<P> + 'static) {
        let operation = operation.into();
        let handle = MutationHandle::new(operation.clone(), mutation);
        self.routes.insert(operation, handle);
    }

    pub fn operations(&self) -> impl Iterator<Item = &OperationId> {
        self.routes.keys()
    }

    /// How many handles have been handed out.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.load(Ordering::Relaxed)
    }
}

impl InProcessTransport<Value> {
    /// Route `operation` to a mutation with a typed input decoded from JSON.
    pub fn route_json<I, M>(self, operation: impl Into<OperationId>, mutation: M) -> Self
    where
        I: DeserializeOwned + Send + 'static,
        M: Mutation<I> + 'static,
    {
        self.route(operation, JsonMutation::new(mutation))
    }
}

impl<P: Send + 'static> Default for InProcessTransport<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> fmt::Debug for InProcessTransport<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InProcessTransport")
            .field("routes", &self.routes.keys().collect::<Vec<_>>())
            .field("subscriptions", &self.subscriptions.load(Ordering::Relaxed))
            .finish()
    }
}

impl<P: Send + 'static> MutationTransport<P> for InProcessTransport<P> {
    fn subscribe(&self, operation: &OperationId) -> Result<MutationHandle<P>, TransportError> {
        let handle = self
            .routes
            .get(operation)
            .cloned()
            .ok_or_else(|| TransportError::UnknownOperation {
                operation: operation.to_string(),
            })?;
        self.subscriptions.fetch_add(1, Ordering::Relaxed);
        Ok(handle)
    }
}

/// Adapts a `Mutation<I>` to accept a JSON payload.
///
/// A payload that does not decode into `I` settles as
/// [`RemoteError::InvalidInput`] without reaching the inner mutation.
pub struct JsonMutation<M, I> {
    inner: M,
    _input: PhantomData<fn(I)>,
}

impl<M, I> JsonMutation<M, I> {
    pub fn new(inner: M) -> Self {
        Self {
            inner,
            _input: PhantomData,
        }
    }
}

#[async_trait]
impl<M, I> Mutation<Value> for JsonMutation<M, I>
where
    I: DeserializeOwned + Send + 'static,
    M: Mutation<I>,
{
    type Output = M::Output;
    type Error = RemoteError;

    async fn call(&self, input: Value) -> Result<M::Output, RemoteError> {
        let typed: I = serde_json::from_value(input)
            .map_err(|err| RemoteError::invalid_input(err.to_string()))?;
        self.inner.call(typed).await.map_err(RemoteError::from_error)
    }
}

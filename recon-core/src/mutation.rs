//! Remote operations as seen by the dispatcher.
//!
//! A [`Mutation`] is a typed async operation with its own output and error
//! types. The dispatcher only cares whether a call settled successfully, so
//! every mutation is erased to [`ErasedMutation`], which yields a
//! [`Settlement`]. [`MutationHandle`] pairs the erased operation with the id
//! it was subscribed under.

use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::error::RemoteError;
use crate::identity::OperationId;

/// Terminal outcome of one remote call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    Succeeded,
    Failed(RemoteError),
}

impl Settlement {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    pub fn error(&self) -> Option<&RemoteError> {
        match self {
            Self::Succeeded => None,
            Self::Failed(err) => Some(err),
        }
    }
}

/// A typed remote operation accepting one payload.
#[async_trait]
pub trait Mutation<P: Send + 'static>: Send + Sync {
    /// Success result. Discarded by the dispatcher after logging.
    type Output: fmt::Debug + Send + 'static;
    /// Typed failure.
    type Error: std::error::Error + Send + Sync + 'static;

    async fn call(&self, input: P) -> Result<Self::Output, Self::Error>;
}

/// Object-safe view of a mutation that reports only its settlement.
#[async_trait]
pub trait ErasedMutation<P>: Send + Sync {
    async fn invoke(&self, input: P) -> Settlement;
}

#[async_trait]
impl<P, M> ErasedMutation<P> for M
where
    P: Send + 'static,
    M: Mutation<P>,
{
    async fn invoke(&self, input: P) -> Settlement {
        match self.call(input).await {
            Ok(output) => {
                tracing::trace!(?output, "Mutation succeeded");
                Settlement::Succeeded
            }
            Err(err) => Settlement::Failed(RemoteError::from_error(err)),
        }
    }
}

// ============================================================================
// HANDLES
// ============================================================================

/// Live handle to a remote operation, as held by one registry slot.
pub struct MutationHandle<P> {
    operation: OperationId,
    inner: Arc<dyn ErasedMutation<P>>,
}

impl<P> MutationHandle<P> {
    pub fn operation(&self) -> &OperationId {
        &self.operation
    }
}

impl<P: Send + 'static> MutationHandle<P> {
    pub fn new(operation: OperationId, mutation: impl Mutation<P> + 'static) -> Self {
        Self {
            operation,
            inner: Arc::new(mutation),
        }
    }

    /// Handle bound to the sentinel operation.
    pub fn sentinel() -> Self {
        Self::new(OperationId::sentinel(), NoopMutation)
    }

    pub async fn invoke(&self, input: P) -> Settlement {
        self.inner.invoke(input).await
    }
}

impl<P> Clone for MutationHandle<P> {
    fn clone(&self) -> Self {
        Self {
            operation: self.operation.clone(),
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P> fmt::Debug for MutationHandle<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationHandle")
            .field("operation", &self.operation)
            .finish_non_exhaustive()
    }
}

/// Operation backing unused slots. Succeeds without doing anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMutation;

#[async_trait]
impl<P: Send + 'static> Mutation<P> for NoopMutation {
    type Output = ();
    type Error = RemoteError;

    async fn call(&self, _input: P) -> Result<(), RemoteError> {
        Ok(())
    }
}

// ============================================================================
// CLOSURE ADAPTER
// ============================================================================

/// Mutation backed by an async closure.
pub struct FnMutation<F> {
    f: F,
}

/// Wrap an async closure `Fn(P) -> impl Future<Output = Result<O, E>>` as a
/// [`Mutation`].
pub fn mutation_fn<F>(f: F) -> FnMutation<F> {
    FnMutation { f }
}

#[async_trait]
impl<P, F, Fut, O, E> Mutation<P> for FnMutation<F>
where
    P: Send + 'static,
    F: Fn(P) -> Fut + Send + Sync,
    Fut: Future<Output = Result<O, E>> + Send,
    O: fmt::Debug + Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    type Output = O;
    type Error = E;

    async fn call(&self, input: P) -> Result<O, E> {
        (self.f)(input).await
    }
}

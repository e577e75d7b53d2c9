//! In-process backend for the playground.
//!
//! Serves the users query and mutations from a shared [`UserStore`], and
//! acknowledges project operations after the configured latency. Operations
//! listed in `fail_operations` are rejected before they touch any state.

use std::collections::HashSet;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use recon_cache::QueryFetcher;
use recon_core::{CacheKey, Mutation, RemoteError};
use recon_dispatch::InProcessTransport;
use serde::Deserialize;
use serde_json::Value;

use crate::config::{PlaygroundConfig, MAX_NAME_LEN};
use crate::reducers::{ops, User, UsersPage};

/// Latency and failure injection shared by every operation.
#[derive(Debug, Clone)]
pub struct Remote {
    latency: Duration,
    failing: Arc<HashSet<String>>,
}

impl Remote {
    pub fn new(latency: Duration, failing: impl IntoIterator<Item = String>) -> Self {
        Self {
            latency,
            failing: Arc::new(failing.into_iter().collect()),
        }
    }

    pub fn from_config(config: &PlaygroundConfig) -> Self {
        Self::new(
            Duration::from_millis(config.remote_latency_ms),
            config.fail_operations.iter().cloned(),
        )
    }

    async fn round_trip(&self, operation: &str) -> Result<(), RemoteError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.failing.contains(operation) {
            tracing::info!(operation, "Rejecting call by configuration");
            return Err(RemoteError::failed(format!("{operation} is configured to fail")));
        }
        Ok(())
    }
}

// ============================================================================
// USERS
// ============================================================================

/// Source of truth for the users list.
#[derive(Debug, Clone, Default)]
pub struct UserStore {
    users: Arc<RwLock<Vec<User>>>,
}

impl UserStore {
    pub fn new(users: impl IntoIterator<Item = User>) -> Self {
        Self {
            users: Arc::new(RwLock::new(users.into_iter().collect())),
        }
    }

    pub fn from_config(config: &PlaygroundConfig) -> Self {
        Self::new(config.seed_users.iter().map(|seed| User {
            id: seed.id.clone(),
            name: seed.name.clone(),
        }))
    }

    pub fn list(&self) -> Vec<User> {
        self.users.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn insert(&self, user: User) -> Result<User, RemoteError> {
        let mut users = self.users.write().unwrap_or_else(PoisonError::into_inner);
        if users.iter().any(|existing| existing.id == user.id) {
            return Err(RemoteError::failed(format!("user {} already exists", user.id)));
        }
        users.push(user.clone());
        Ok(user)
    }

    fn remove(&self, id: &str) -> Result<(), RemoteError> {
        let mut users = self.users.write().unwrap_or_else(PoisonError::into_inner);
        let before = users.len();
        users.retain(|user| user.id != id);
        if users.len() == before {
            return Err(RemoteError::failed(format!("user {id} not found")));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserInput {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeleteUserInput {
    pub id: String,
}

pub struct UsersQuery {
    store: UserStore,
    remote: Remote,
}

impl UsersQuery {
    pub fn new(store: UserStore, remote: Remote) -> Self {
        Self { store, remote }
    }
}

#[async_trait]
impl QueryFetcher<UsersPage> for UsersQuery {
    async fn fetch(&self, _key: &CacheKey) -> Result<UsersPage, RemoteError> {
        self.remote.round_trip(ops::USERS_GET).await?;
        Ok(UsersPage {
            users: self.store.list(),
        })
    }
}

pub struct CreateUser {
    store: UserStore,
    remote: Remote,
}

#[async_trait]
impl Mutation<CreateUserInput> for CreateUser {
    type Output = User;
    type Error = RemoteError;

    async fn call(&self, input: CreateUserInput) -> Result<User, RemoteError> {
        self.remote.round_trip(ops::USER_CREATE).await?;
        let len = input.name.chars().count();
        if len == 0 || len > MAX_NAME_LEN {
            return Err(RemoteError::invalid_input(format!(
                "name must be 1 to {MAX_NAME_LEN} characters"
            )));
        }
        self.store.insert(User {
            id: input.id,
            name: input.name,
        })
    }
}

pub struct DeleteUser {
    store: UserStore,
    remote: Remote,
}

#[async_trait]
impl Mutation<DeleteUserInput> for DeleteUser {
    type Output = ();
    type Error = RemoteError;

    async fn call(&self, input: DeleteUserInput) -> Result<(), RemoteError> {
        self.remote.round_trip(ops::USER_DELETE).await?;
        self.store.remove(&input.id)
    }
}

/// Transport serving the user mutations.
pub fn user_transport(store: &UserStore, remote: &Remote) -> InProcessTransport<Value> {
    InProcessTransport::new()
        .route_json::<CreateUserInput, _>(
            ops::USER_CREATE,
            CreateUser {
                store: store.clone(),
                remote: remote.clone(),
            },
        )
        .route_json::<DeleteUserInput, _>(
            ops::USER_DELETE,
            DeleteUser {
                store: store.clone(),
                remote: remote.clone(),
            },
        )
}

// ============================================================================
// PROJECTS
// ============================================================================

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VoteType {
    Up,
    Down,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VoteInput {
    pub project_id: u64,
    #[serde(rename = "type")]
    pub kind: VoteType,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectRef {
    pub project_id: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RequestToJoinInput {
    pub project_id: u64,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CancelRequestInput {
    pub request_id: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InviteInput {
    pub user_id: String,
    pub project_id: u64,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AcceptInviteInput {
    pub project_id: u64,
    pub user_id: String,
}

/// Operation that validates its input and echoes it back.
pub struct Acknowledge<I> {
    operation: &'static str,
    remote: Remote,
    _input: PhantomData<fn(I)>,
}

impl<I> Acknowledge<I> {
    pub fn new(operation: &'static str, remote: Remote) -> Self {
        Self {
            operation,
            remote,
            _input: PhantomData,
        }
    }
}

impl<I> fmt::Debug for Acknowledge<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Acknowledge")
            .field("operation", &self.operation)
            .finish()
    }
}

#[async_trait]
impl<I> Mutation<I> for Acknowledge<I>
where
    I: fmt::Debug + Send + 'static,
{
    type Output = I;
    type Error = RemoteError;

    async fn call(&self, input: I) -> Result<I, RemoteError> {
        self.remote.round_trip(self.operation).await?;
        Ok(input)
    }
}

fn acknowledge<I>(
    transport: InProcessTransport<Value>,
    operation: &'static str,
    remote: &Remote,
) -> InProcessTransport<Value>
where
    I: fmt::Debug + serde::de::DeserializeOwned + Send + 'static,
{
    transport.route_json::<I, _>(operation, Acknowledge::<I>::new(operation, remote.clone()))
}

/// Transport serving every project operation used by the project page and
/// the activity feed.
pub fn project_transport(remote: &Remote) -> InProcessTransport<Value> {
    let transport = InProcessTransport::new();
    let transport = acknowledge::<VoteInput>(transport, ops::VOTE, remote);
    let transport = acknowledge::<ProjectRef>(transport, ops::UNDO_VOTE, remote);
    let transport = acknowledge::<RequestToJoinInput>(transport, ops::REQUEST_TO_JOIN, remote);
    let transport = acknowledge::<CancelRequestInput>(transport, ops::CANCEL_REQUEST, remote);
    let transport = acknowledge::<InviteInput>(transport, ops::INVITE_TO_PROJECT, remote);
    acknowledge::<AcceptInviteInput>(transport, ops::ACCEPT_INVITE, remote)
}

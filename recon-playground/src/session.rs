//! Scripted playground session.
//!
//! Drives three dispatchers the way their pages would: the users list backed
//! by a real query, and the project page and activity feed seeded in the
//! cache directly.

use std::sync::Arc;

use recon_cache::{MemoryQueryCache, QueryCache, SnapshotReceiver};
use recon_core::{Action, CacheError, CacheKey, CachedValue, DispatchOptions, QuerySnapshot};
use recon_dispatch::{DispatchEvent, DispatchRoute, Dispatcher, DispatcherBuilder};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::broadcast;

use crate::config::PlaygroundConfig;
use crate::error::PlaygroundResult;
use crate::reducers::{
    activity_reducer, ops, project_reducer, users_reducer, ActivityFeed, ActivityItem,
    ActivityKind, MembershipRequest, Project, ProjectContext, ProjectPage, UsersPage, Vote,
    VoteKind,
};
use crate::server::{project_transport, user_transport, Remote, UserStore, UsersQuery};

/// What the session ended with.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    /// Users as projected by the reducer before the final refetch.
    pub projected_users: UsersPage,
    /// Users after refetching from the store.
    pub users: UsersPage,
    pub project: ProjectPage,
    pub activity: ActivityFeed,
    /// Dispatches dropped for lack of a bound slot.
    pub dropped: usize,
    /// Remote calls that settled with an error.
    pub failed: usize,
    pub events: Vec<DispatchEvent>,
}

/// Wait until `key` has finished loading.
async fn loaded<V: CachedValue>(
    key: &CacheKey,
    mut snapshots: SnapshotReceiver<V>,
) -> PlaygroundResult<QuerySnapshot<V>> {
    let fetch_failed = |message: String| CacheError::FetchFailed {
        query: key.query().to_string(),
        message,
    };
    let snapshot = snapshots
        .wait_for(|snapshot| !snapshot.fetching && !snapshot.is_pending())
        .await
        .map_err(|_| fetch_failed("cache entry closed".to_string()))?
        .clone();
    match snapshot.error.clone() {
        Some(message) if snapshot.is_error() => Err(fetch_failed(message).into()),
        _ => Ok(snapshot),
    }
}

fn drain(events: &mut broadcast::Receiver<DispatchEvent>, into: &mut Vec<DispatchEvent>) {
    while let Ok(event) = events.try_recv() {
        into.push(event);
    }
}

pub async fn run(config: &PlaygroundConfig) -> PlaygroundResult<SessionReport> {
    let remote = Remote::from_config(config);
    let mut events = Vec::new();
    let mut dropped = 0;

    // ------------------------------------------------------------------
    // Users list
    // ------------------------------------------------------------------
    let store = UserStore::from_config(config);
    let users_cache = Arc::new(MemoryQueryCache::<UsersPage>::new());
    let users_key = CacheKey::new(ops::USERS_GET);
    let fetcher = Arc::new(UsersQuery::new(store.clone(), remote.clone()));
    users_cache.fetch(&users_key, fetcher)?;
    let initial = loaded(&users_key, users_cache.subscribe(&users_key)).await?;
    tracing::info!(users = ?initial.data, "Users loaded");

    let users: Dispatcher<UsersPage, Value> =
        DispatcherBuilder::new(users_reducer, users_key.clone())
            .bind_same(ops::USER_CREATE)
            .bind_same(ops::USER_DELETE)
            .config(config.dispatcher.clone())
            .build(users_cache.clone(), &user_transport(&store, &remote))?;
    let mut user_events = users.events();

    let created = users.send(Action::new(
        ops::USER_CREATE,
        json!({"id": "u-100", "name": "linus"}),
    ));
    tracing::info!(
        dispatch_id = %created.dispatch_id(),
        users = ?created.snapshot().data,
        "Create dispatched, cache not yet reconciled"
    );
    created.settled().await;

    if let Some(first) = store.list().first() {
        users
            .send(Action::new(ops::USER_DELETE, json!({"id": first.id})))
            .settled()
            .await;
    }

    let renamed = users.send(Action::new(
        ops::USER_RENAME,
        json!({"id": "u-100", "name": "torvalds"}),
    ));
    if renamed.route() == DispatchRoute::Dropped {
        dropped += 1;
        tracing::info!(tag = ops::USER_RENAME, "Rename is not bound on this page");
    }

    // The service rejects the empty name; by default the reducer still
    // projects it into the cache.
    users
        .send(Action::new(ops::USER_CREATE, json!({"id": "u-101", "name": ""})))
        .settled()
        .await;
    let projected_users = users.get_snapshot().data.unwrap_or_default();

    users_cache.invalidate(&users_key).await?;
    let refreshed = loaded(&users_key, users.subscribe()).await?;
    drain(&mut user_events, &mut events);

    // ------------------------------------------------------------------
    // Project page
    // ------------------------------------------------------------------
    let projects = project_transport(&remote);
    let project_cache: Arc<dyn QueryCache<ProjectPage>> = Arc::new(MemoryQueryCache::new());
    let project_key = CacheKey::with_input(ops::PROJECT_GET, json!({"id": 7}));
    project_cache.write(&project_key, seed_project());

    let project: Dispatcher<ProjectPage, Value, ProjectContext> =
        DispatcherBuilder::new(project_reducer, project_key)
            .bind_same(ops::REQUEST_TO_JOIN)
            .bind_same(ops::CANCEL_REQUEST)
            .bind_same(ops::VOTE)
            .bind_same(ops::UNDO_VOTE)
            .bind_same(ops::INVITE_TO_PROJECT)
            .config(config.dispatcher.clone())
            .build(project_cache, &projects)?;
    let mut project_events = project.events();

    let session = ProjectContext {
        is_invite: false,
        session_id: Some("u-2".to_string()),
    };
    let steps = [
        (
            Action::new(ops::VOTE, json!({"user_id": "u-2", "project_id": 7, "type": "UP"})),
            None,
        ),
        (Action::new(ops::UNDO_VOTE, json!({"user_id": "u-1", "project_id": 7})), None),
        (
            Action::new(
                ops::REQUEST_TO_JOIN,
                json!({"user_id": "u-2", "owner_id": "u-1", "request_id": 41, "project_id": 7}),
            ),
            None,
        ),
        (Action::new(ops::CANCEL_REQUEST, json!({"request_id": 41})), None),
        (
            Action::new(ops::INVITE_TO_PROJECT, json!({"user_id": "u-3", "project_id": 7})),
            Some(session.clone()),
        ),
        (
            Action::new(ops::CANCEL_REQUEST, json!({"request_id": 7})),
            Some(ProjectContext {
                is_invite: true,
                ..session
            }),
        ),
    ];
    for (action, extra) in steps {
        let options = DispatchOptions {
            only_update_cache: false,
            extra,
        };
        project.dispatch(action, options).settled().await;
    }
    let project_page = project.get_snapshot().data.unwrap_or_else(seed_project);
    drain(&mut project_events, &mut events);

    // ------------------------------------------------------------------
    // Activity feed
    // ------------------------------------------------------------------
    let activity_cache: Arc<dyn QueryCache<ActivityFeed>> = Arc::new(MemoryQueryCache::new());
    let activity_key = CacheKey::new(ops::USER_ACTIVITY);
    activity_cache.write(&activity_key, seed_activity());

    let activity: Dispatcher<ActivityFeed, Value> =
        DispatcherBuilder::new(activity_reducer, activity_key)
            .bind_same(ops::CANCEL_REQUEST)
            .bind_same(ops::ACCEPT_INVITE)
            .config(config.dispatcher.clone())
            .build(activity_cache, &projects)?;
    let mut activity_events = activity.events();

    activity
        .send(Action::new(ops::CANCEL_REQUEST, json!({"request_id": 1})))
        .settled()
        .await;
    // Local-only transition, no server round trip.
    activity.dispatch(
        Action::new(ops::ACCEPT_INVITE, json!({"project_id": 8, "user_id": "u-2"})),
        DispatchOptions::cache_only(),
    );
    let activity_feed = activity.get_snapshot().data.unwrap_or_default();
    drain(&mut activity_events, &mut events);

    let failed = events
        .iter()
        .filter(|event| matches!(event, DispatchEvent::Settled { succeeded: false, .. }))
        .count();
    tracing::info!(dropped, failed, events = events.len(), "Session finished");

    Ok(SessionReport {
        projected_users,
        users: refreshed.data.unwrap_or_default(),
        project: project_page,
        activity: activity_feed,
        dropped,
        failed,
        events,
    })
}

fn seed_project() -> ProjectPage {
    ProjectPage {
        project: Project {
            id: 7,
            owner_id: "u-1".to_string(),
            voted_by: vec![Vote {
                user_id: "u-1".to_string(),
                project_id: 7,
                kind: VoteKind::Up,
            }],
        },
        requested_by_user: Vec::new(),
        invited_by_user: vec![MembershipRequest {
            id: 3,
            user_id: "u-4".to_string(),
            owner_id: "u-2".to_string(),
        }],
    }
}

fn seed_activity() -> ActivityFeed {
    ActivityFeed {
        activity: vec![
            ActivityItem {
                id: 1,
                kind: ActivityKind::JoinRequest,
                project_id: 7,
                user_id: "u-3".to_string(),
            },
            ActivityItem {
                id: 2,
                kind: ActivityKind::Invite,
                project_id: 8,
                user_id: "u-2".to_string(),
            },
        ],
    }
}

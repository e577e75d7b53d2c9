//! Page reducers.
//!
//! Every page caches a typed value and receives JSON payloads, decoded here
//! into the shape each tag expects. A payload that does not decode, or a tag
//! the page does not know, leaves the value unchanged.

use recon_core::Action;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Operation ids served by the in-process backend. Tags equal their
/// operation's id.
pub mod ops {
    pub const USERS_GET: &str = "example.users.get";
    pub const USER_CREATE: &str = "example.user.create";
    pub const USER_DELETE: &str = "example.user.delete";
    pub const USER_RENAME: &str = "example.user.rename";

    pub const PROJECT_GET: &str = "project.get";
    pub const REQUEST_TO_JOIN: &str = "project.request-to-join";
    pub const CANCEL_REQUEST: &str = "project.cancel-request";
    pub const VOTE: &str = "project.vote";
    pub const UNDO_VOTE: &str = "project.undo-vote";
    pub const INVITE_TO_PROJECT: &str = "project.invite-to-project";
    pub const ACCEPT_INVITE: &str = "project.accept-invite";

    pub const USER_ACTIVITY: &str = "user.activity";
}

fn decode<T: DeserializeOwned>(action: &Action<Value>) -> Option<T> {
    match T::deserialize(&action.payload) {
        Ok(payload) => Some(payload),
        Err(err) => {
            tracing::debug!(tag = %action.tag, error = %err, "Payload does not fit reducer");
            None
        }
    }
}

// ============================================================================
// USERS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsersPage {
    pub users: Vec<User>,
}

#[derive(Debug, Deserialize)]
struct UserRef {
    id: String,
}

pub fn users_reducer(current: &UsersPage, action: &Action<Value>, _extra: Option<&()>) -> UsersPage {
    let mut next = current.clone();
    match action.tag.as_str() {
        ops::USER_CREATE => {
            if let Some(user) = decode::<User>(action) {
                next.users.push(user);
            }
        }
        ops::USER_DELETE => {
            if let Some(UserRef { id }) = decode(action) {
                next.users.retain(|user| user.id != id);
            }
        }
        _ => {}
    }
    next
}

// ============================================================================
// PROJECT PAGE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VoteKind {
    Up,
    Down,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub user_id: String,
    pub project_id: u64,
    #[serde(rename = "type")]
    pub kind: VoteKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: u64,
    pub owner_id: String,
    pub voted_by: Vec<Vote>,
}

/// A pending join request or invite between a user and a project owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipRequest {
    pub id: u64,
    pub user_id: String,
    pub owner_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectPage {
    pub project: Project,
    /// Join requests the viewing user has sent.
    pub requested_by_user: Vec<MembershipRequest>,
    /// Invites the viewing user has sent.
    pub invited_by_user: Vec<MembershipRequest>,
}

/// Caller context for project dispatches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectContext {
    /// The request being cancelled is an invite, not a join request.
    #[serde(default)]
    pub is_invite: bool,
    /// Id of the signed-in user.
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UndoVote {
    user_id: String,
}

#[derive(Debug, Deserialize)]
struct JoinRequest {
    user_id: String,
    owner_id: String,
    request_id: u64,
}

#[derive(Debug, Deserialize)]
struct Invite {
    user_id: String,
    project_id: u64,
}

pub fn project_reducer(
    current: &ProjectPage,
    action: &Action<Value>,
    extra: Option<&ProjectContext>,
) -> ProjectPage {
    let mut next = current.clone();
    match action.tag.as_str() {
        ops::CANCEL_REQUEST => {
            if extra.is_some_and(|context| context.is_invite) {
                next.invited_by_user.clear();
            } else {
                next.requested_by_user.clear();
            }
        }
        ops::REQUEST_TO_JOIN => {
            if let Some(request) = decode::<JoinRequest>(action) {
                next.requested_by_user = vec![MembershipRequest {
                    id: request.request_id,
                    user_id: request.user_id,
                    owner_id: request.owner_id,
                }];
            }
        }
        ops::VOTE => {
            if let Some(vote) = decode::<Vote>(action) {
                next.project.voted_by.push(vote);
            }
        }
        ops::UNDO_VOTE => {
            if let Some(UndoVote { user_id }) = decode(action) {
                next.project.voted_by.retain(|vote| vote.user_id != user_id);
            }
        }
        ops::INVITE_TO_PROJECT => {
            // The invite's owner is whoever is signed in; without a session
            // there is nothing sensible to project.
            let owner = extra.and_then(|context| context.session_id.clone());
            if let (Some(invite), Some(owner_id)) = (decode::<Invite>(action), owner) {
                next.invited_by_user = vec![MembershipRequest {
                    id: invite.project_id,
                    user_id: invite.user_id,
                    owner_id,
                }];
            }
        }
        _ => {}
    }
    next
}

// ============================================================================
// ACTIVITY FEED
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    JoinRequest,
    Invite,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityItem {
    pub id: u64,
    pub kind: ActivityKind,
    pub project_id: u64,
    pub user_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityFeed {
    pub activity: Vec<ActivityItem>,
}

#[derive(Debug, Deserialize)]
struct CancelRequest {
    request_id: u64,
}

#[derive(Debug, Deserialize)]
struct AcceptInvite {
    project_id: u64,
    user_id: String,
}

pub fn activity_reducer(current: &ActivityFeed, action: &Action<Value>, _extra: Option<&()>) -> ActivityFeed {
    let mut next = current.clone();
    match action.tag.as_str() {
        ops::CANCEL_REQUEST => {
            if let Some(CancelRequest { request_id }) = decode(action) {
                next.activity.retain(|item| item.id != request_id);
            }
        }
        ops::ACCEPT_INVITE => {
            if let Some(accepted) = decode::<AcceptInvite>(action) {
                next.activity.retain(|item| {
                    !(item.kind == ActivityKind::Invite
                        && item.project_id == accepted.project_id
                        && item.user_id == accepted.user_id)
                });
            }
        }
        _ => {}
    }
    next
}

//! State transitions over the relationship tables: event membership, chat
//! membership with invitations, follow edges and post likes.
//!
//! Every operation here takes the caller id as an explicit argument (resolved
//! once at the HTTP boundary) and fails fast with a typed error; nothing is
//! retried internally. Check-then-act pairs run as single conditional SQL
//! statements so concurrent callers cannot interleave between the check and
//! the write.

mod chats;
mod events;
mod social;

#[cfg(test)]
mod tests;

pub use chats::{
    accept_invitation, create_group_chat, create_private_chat, invite_to_group, leave_group,
    reject_invitation, ChatMembership, ChatRecord, ChatState,
};
pub use events::{join_event, leave_event, EventMembership};
pub use social::{follow, toggle_like, unfollow, LikeAction};

use std::fmt;
use std::future::Future;
use std::time::Duration;

use axum::http::StatusCode;

/// Per-request deadline for a single store transition.
const STORE_DEADLINE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    User,
    Event,
    Chat,
    Post,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Entity::User => "user",
            Entity::Event => "event",
            Entity::Chat => "chat",
            Entity::Post => "post",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MembershipError {
    #[error("{0} not found")]
    NotFound(Entity),

    #[error("event is already at capacity")]
    CapacityExceeded,

    #[error("already a member of this event")]
    AlreadyMember,

    #[error("already invited to or a member of this chat")]
    AlreadyInvitedOrMember,

    #[error("chat is not a group chat")]
    NotAGroupChat,

    #[error("inviter is not an active member of this chat")]
    InviterNotMember,

    #[error("not an active member of this chat")]
    NotAMember,

    #[error("no pending invitation for this chat")]
    NoPendingInvitation,

    #[error("users cannot follow themselves")]
    SelfFollowForbidden,

    #[error("already following this user")]
    AlreadyFollowing,

    #[error("not following this user")]
    NotFollowing,

    #[error("{0}")]
    InvalidInput(&'static str),

    #[error("store deadline expired")]
    Timeout,

    #[error("store unavailable: {0}")]
    Store(#[from] sqlx::Error),
}

impl MembershipError {
    pub fn kind(&self) -> &'static str {
        match self {
            MembershipError::NotFound(_) => "not_found",
            MembershipError::CapacityExceeded => "capacity_exceeded",
            MembershipError::AlreadyMember => "already_member",
            MembershipError::AlreadyInvitedOrMember => "already_invited_or_member",
            MembershipError::NotAGroupChat => "not_a_group_chat",
            MembershipError::InviterNotMember => "inviter_not_member",
            MembershipError::NotAMember => "not_a_member",
            MembershipError::NoPendingInvitation => "no_pending_invitation",
            MembershipError::SelfFollowForbidden => "self_follow_forbidden",
            MembershipError::AlreadyFollowing => "already_following",
            MembershipError::NotFollowing => "not_following",
            MembershipError::InvalidInput(_) => "invalid_input",
            MembershipError::Timeout => "timeout",
            MembershipError::Store(_) => "store_unavailable",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            MembershipError::NotFound(_) => StatusCode::NOT_FOUND,
            MembershipError::CapacityExceeded
            | MembershipError::AlreadyMember
            | MembershipError::AlreadyInvitedOrMember
            | MembershipError::SelfFollowForbidden
            | MembershipError::AlreadyFollowing
            | MembershipError::NotFollowing
            | MembershipError::NotAGroupChat
            | MembershipError::InviterNotMember
            | MembershipError::NotAMember
            | MembershipError::NoPendingInvitation => StatusCode::CONFLICT,
            MembershipError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            MembershipError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            MembershipError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type MembershipResult<T> = Result<T, MembershipError>;

/// Runs a transition under [`STORE_DEADLINE`]; expiry surfaces as
/// [`MembershipError::Timeout`] rather than a store failure.
pub(crate) async fn with_deadline<T>(
    fut: impl Future<Output = MembershipResult<T>>,
) -> MembershipResult<T> {
    match tokio::time::timeout(STORE_DEADLINE, fut).await {
        Ok(res) => res,
        Err(_) => Err(MembershipError::Timeout),
    }
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

pub(crate) fn now_ts() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}

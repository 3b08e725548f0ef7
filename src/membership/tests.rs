use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db;
use crate::membership::{self, ChatState, Entity, LikeAction, MembershipError};

// A single-connection in-memory pool: every task shares the one database and
// statements from concurrent tasks serialize at the store, like production.
async fn test_pool() -> SqlitePool {
    let db_pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory pool");
    db::init(&db_pool).await.expect("schema init");
    db_pool
}

async fn seed_user(db_pool: &SqlitePool, username: &str) -> Uuid {
    let id = Uuid::now_v7();
    sqlx::query("INSERT INTO users (id,username,password_hash,role,created_at) VALUES (?,?,'x','user',0)")
        .bind(id.to_string())
        .bind(username)
        .execute(db_pool)
        .await
        .expect("seed user");
    id
}

async fn seed_event(db_pool: &SqlitePool, organizer: Uuid, cap: Option<i64>) -> Uuid {
    let id = Uuid::now_v7();
    sqlx::query(
        "INSERT INTO events (id,organizer_id,title,location,starts_at,max_participants,created_at) \
         VALUES (?,?,'Morning run','Park',0,?,0)",
    )
    .bind(id.to_string())
    .bind(organizer.to_string())
    .bind(cap)
    .execute(db_pool)
    .await
    .expect("seed event");
    id
}

async fn seed_post(db_pool: &SqlitePool, author: Uuid) -> Uuid {
    let id = Uuid::now_v7();
    sqlx::query("INSERT INTO posts (id,author_id,content,created_at) VALUES (?,?,'leg day',0)")
        .bind(id.to_string())
        .bind(author.to_string())
        .execute(db_pool)
        .await
        .expect("seed post");
    id
}

async fn event_member_count(db_pool: &SqlitePool, event_id: Uuid) -> i64 {
    let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM event_members WHERE event_id=?")
        .bind(event_id.to_string())
        .fetch_one(db_pool)
        .await
        .expect("count");
    n
}

async fn chat_member_row(
    db_pool: &SqlitePool,
    chat_id: Uuid,
    user_id: Uuid,
) -> Option<(String, Option<i64>)> {
    sqlx::query_as("SELECT state,joined_at FROM chat_members WHERE chat_id=? AND user_id=?")
        .bind(chat_id.to_string())
        .bind(user_id.to_string())
        .fetch_optional(db_pool)
        .await
        .expect("row")
}

async fn chat_exists(db_pool: &SqlitePool, chat_id: Uuid) -> bool {
    sqlx::query("SELECT 1 FROM chats WHERE id=?")
        .bind(chat_id.to_string())
        .fetch_optional(db_pool)
        .await
        .expect("chat lookup")
        .is_some()
}

#[test_log::test(tokio::test)]
async fn concurrent_joins_never_exceed_capacity() {
    let db_pool = test_pool().await;
    let organizer = seed_user(&db_pool, "organizer").await;
    let event_id = seed_event(&db_pool, organizer, Some(3)).await;

    let mut joiners = Vec::new();
    for i in 0..8 {
        joiners.push(seed_user(&db_pool, &format!("runner{i}")).await);
    }

    let mut handles = Vec::new();
    for user_id in joiners {
        let db_pool = db_pool.clone();
        handles.push(tokio::spawn(async move {
            membership::join_event(&db_pool, event_id, user_id).await
        }));
    }

    let mut ok = 0;
    let mut full = 0;
    for handle in handles {
        match handle.await.expect("join task") {
            Ok(_) => ok += 1,
            Err(MembershipError::CapacityExceeded) => full += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(ok, 3);
    assert_eq!(full, 5);
    assert_eq!(event_member_count(&db_pool, event_id).await, 3);
}

#[test_log::test(tokio::test)]
async fn full_event_frees_a_seat_on_leave() {
    let db_pool = test_pool().await;
    let u1 = seed_user(&db_pool, "u1").await;
    let u2 = seed_user(&db_pool, "u2").await;
    let event_id = seed_event(&db_pool, u1, Some(1)).await;

    membership::join_event(&db_pool, event_id, u1).await.expect("first join");
    assert_eq!(event_member_count(&db_pool, event_id).await, 1);

    let err = membership::join_event(&db_pool, event_id, u2).await.unwrap_err();
    assert!(matches!(err, MembershipError::CapacityExceeded), "got {err}");

    membership::leave_event(&db_pool, event_id, u1).await.expect("leave");
    assert_eq!(event_member_count(&db_pool, event_id).await, 0);

    membership::join_event(&db_pool, event_id, u2).await.expect("rejoin after seat freed");
    assert_eq!(event_member_count(&db_pool, event_id).await, 1);
}

#[test_log::test(tokio::test)]
async fn joining_twice_is_rejected() {
    let db_pool = test_pool().await;
    let user = seed_user(&db_pool, "u").await;
    let event_id = seed_event(&db_pool, user, None).await;

    membership::join_event(&db_pool, event_id, user).await.expect("join");
    let err = membership::join_event(&db_pool, event_id, user).await.unwrap_err();
    assert!(matches!(err, MembershipError::AlreadyMember), "got {err}");
}

#[test_log::test(tokio::test)]
async fn joining_a_missing_event_is_not_found() {
    let db_pool = test_pool().await;
    let user = seed_user(&db_pool, "u").await;

    let err = membership::join_event(&db_pool, Uuid::now_v7(), user).await.unwrap_err();
    assert!(matches!(err, MembershipError::NotFound(Entity::Event)), "got {err}");
}

#[test_log::test(tokio::test)]
async fn leave_event_is_idempotent() {
    let db_pool = test_pool().await;
    let user = seed_user(&db_pool, "u").await;
    let event_id = seed_event(&db_pool, user, None).await;

    membership::join_event(&db_pool, event_id, user).await.expect("join");
    membership::leave_event(&db_pool, event_id, user).await.expect("first leave");
    membership::leave_event(&db_pool, event_id, user).await.expect("second leave is a no-op");
    assert_eq!(event_member_count(&db_pool, event_id).await, 0);
}

#[test_log::test(tokio::test)]
async fn like_toggle_alternates() {
    let db_pool = test_pool().await;
    let user = seed_user(&db_pool, "u").await;
    let post_id = seed_post(&db_pool, user).await;

    let first = membership::toggle_like(&db_pool, post_id, user).await.expect("first");
    let second = membership::toggle_like(&db_pool, post_id, user).await.expect("second");
    let third = membership::toggle_like(&db_pool, post_id, user).await.expect("third");

    assert_eq!(first, LikeAction::Liked);
    assert_eq!(second, LikeAction::Disliked);
    assert_eq!(third, LikeAction::Liked);
}

#[test_log::test(tokio::test)]
async fn liking_a_missing_post_is_not_found() {
    let db_pool = test_pool().await;
    let user = seed_user(&db_pool, "u").await;

    let err = membership::toggle_like(&db_pool, Uuid::now_v7(), user).await.unwrap_err();
    assert!(matches!(err, MembershipError::NotFound(Entity::Post)), "got {err}");
}

#[test_log::test(tokio::test)]
async fn self_follow_is_always_rejected() {
    let db_pool = test_pool().await;
    let user = seed_user(&db_pool, "u").await;

    let err = membership::follow(&db_pool, user, user).await.unwrap_err();
    assert!(matches!(err, MembershipError::SelfFollowForbidden), "got {err}");
}

#[test_log::test(tokio::test)]
async fn follow_is_strict_not_a_toggle() {
    let db_pool = test_pool().await;
    let a = seed_user(&db_pool, "a").await;
    let b = seed_user(&db_pool, "b").await;

    membership::follow(&db_pool, a, b).await.expect("follow");
    let err = membership::follow(&db_pool, a, b).await.unwrap_err();
    assert!(matches!(err, MembershipError::AlreadyFollowing), "got {err}");

    membership::unfollow(&db_pool, a, b).await.expect("unfollow");
    let err = membership::unfollow(&db_pool, a, b).await.unwrap_err();
    assert!(matches!(err, MembershipError::NotFollowing), "got {err}");
}

#[test_log::test(tokio::test)]
async fn invitation_accept_activates_with_timestamp() {
    let db_pool = test_pool().await;
    let a = seed_user(&db_pool, "a").await;
    let b = seed_user(&db_pool, "b").await;
    let c = seed_user(&db_pool, "c").await;

    let chat = membership::create_group_chat(&db_pool, a, "lifting crew", &[b])
        .await
        .expect("group chat");

    let invite = membership::invite_to_group(&db_pool, chat.id, a, c).await.expect("invite");
    assert_eq!(invite.state, ChatState::Pending);
    assert!(invite.joined_at.is_none());

    let (state, joined_at) = chat_member_row(&db_pool, chat.id, c).await.expect("pending row");
    assert_eq!(state, "pending");
    assert!(joined_at.is_none());

    membership::accept_invitation(&db_pool, chat.id, c).await.expect("accept");
    let (state, joined_at) = chat_member_row(&db_pool, chat.id, c).await.expect("active row");
    assert_eq!(state, "active");
    assert!(joined_at.is_some());
}

#[test_log::test(tokio::test)]
async fn invitation_reject_removes_the_row() {
    let db_pool = test_pool().await;
    let a = seed_user(&db_pool, "a").await;
    let b = seed_user(&db_pool, "b").await;
    let c = seed_user(&db_pool, "c").await;

    let chat = membership::create_group_chat(&db_pool, a, "yoga", &[b]).await.expect("group chat");
    membership::invite_to_group(&db_pool, chat.id, a, c).await.expect("invite");

    membership::reject_invitation(&db_pool, chat.id, c).await.expect("reject");
    assert!(chat_member_row(&db_pool, chat.id, c).await.is_none());

    let err = membership::accept_invitation(&db_pool, chat.id, c).await.unwrap_err();
    assert!(matches!(err, MembershipError::NoPendingInvitation), "got {err}");
}

#[test_log::test(tokio::test)]
async fn invite_preconditions() {
    let db_pool = test_pool().await;
    let a = seed_user(&db_pool, "a").await;
    let b = seed_user(&db_pool, "b").await;
    let c = seed_user(&db_pool, "c").await;
    let outsider = seed_user(&db_pool, "outsider").await;

    let private = membership::create_private_chat(&db_pool, a, b).await.expect("private chat");
    let err = membership::invite_to_group(&db_pool, private.id, a, c).await.unwrap_err();
    assert!(matches!(err, MembershipError::NotAGroupChat), "got {err}");

    let group = membership::create_group_chat(&db_pool, a, "spin class", &[b]).await.expect("group");
    let err = membership::invite_to_group(&db_pool, group.id, outsider, c).await.unwrap_err();
    assert!(matches!(err, MembershipError::InviterNotMember), "got {err}");

    // A pending invitee is not an active member either.
    membership::invite_to_group(&db_pool, group.id, a, c).await.expect("invite");
    let err = membership::invite_to_group(&db_pool, group.id, c, outsider).await.unwrap_err();
    assert!(matches!(err, MembershipError::InviterNotMember), "got {err}");

    let err = membership::invite_to_group(&db_pool, group.id, a, c).await.unwrap_err();
    assert!(matches!(err, MembershipError::AlreadyInvitedOrMember), "got {err}");

    let err = membership::invite_to_group(&db_pool, group.id, a, b).await.unwrap_err();
    assert!(matches!(err, MembershipError::AlreadyInvitedOrMember), "got {err}");
}

#[test_log::test(tokio::test)]
async fn group_chat_is_collected_with_its_last_member() {
    let db_pool = test_pool().await;
    let u1 = seed_user(&db_pool, "u1").await;
    let u2 = seed_user(&db_pool, "u2").await;
    let u3 = seed_user(&db_pool, "u3").await;

    let chat = membership::create_group_chat(&db_pool, u1, "trail runners", &[u2])
        .await
        .expect("group chat");
    membership::invite_to_group(&db_pool, chat.id, u1, u3).await.expect("invite");
    membership::accept_invitation(&db_pool, chat.id, u3).await.expect("accept");

    membership::leave_group(&db_pool, chat.id, u2).await.expect("u2 leaves");
    membership::leave_group(&db_pool, chat.id, u3).await.expect("u3 leaves");
    assert!(chat_exists(&db_pool, chat.id).await, "chat must outlive remaining member");

    membership::leave_group(&db_pool, chat.id, u1).await.expect("last member leaves");
    assert!(!chat_exists(&db_pool, chat.id).await, "empty chat must be collected");

    let err = membership::leave_group(&db_pool, chat.id, u1).await.unwrap_err();
    assert!(matches!(err, MembershipError::NotFound(Entity::Chat)), "got {err}");
}

#[test_log::test(tokio::test)]
async fn pending_invitation_keeps_the_chat_alive() {
    let db_pool = test_pool().await;
    let a = seed_user(&db_pool, "a").await;
    let b = seed_user(&db_pool, "b").await;
    let c = seed_user(&db_pool, "c").await;

    let chat = membership::create_group_chat(&db_pool, a, "rowers", &[b]).await.expect("group");
    membership::invite_to_group(&db_pool, chat.id, a, c).await.expect("invite");

    membership::leave_group(&db_pool, chat.id, a).await.expect("a leaves");
    membership::leave_group(&db_pool, chat.id, b).await.expect("b leaves");
    assert!(chat_exists(&db_pool, chat.id).await, "pending relation still holds the chat");

    membership::reject_invitation(&db_pool, chat.id, c).await.expect("reject");
    assert!(!chat_exists(&db_pool, chat.id).await, "rejecting the last relation collects the chat");
}

#[test_log::test(tokio::test)]
async fn private_chat_members_are_active_immediately() {
    let db_pool = test_pool().await;
    let a = seed_user(&db_pool, "a").await;
    let b = seed_user(&db_pool, "b").await;

    let chat = membership::create_private_chat(&db_pool, a, b).await.expect("private chat");
    assert!(!chat.is_group);
    assert!(chat.name.is_none());

    for user in [a, b] {
        let (state, joined_at) = chat_member_row(&db_pool, chat.id, user).await.expect("row");
        assert_eq!(state, "active");
        assert!(joined_at.is_some());
    }

    let err = membership::accept_invitation(&db_pool, chat.id, b).await.unwrap_err();
    assert!(matches!(err, MembershipError::NoPendingInvitation), "got {err}");
}

#[test_log::test(tokio::test)]
async fn group_chat_creation_is_validated() {
    let db_pool = test_pool().await;
    let a = seed_user(&db_pool, "a").await;
    let b = seed_user(&db_pool, "b").await;

    let err = membership::create_group_chat(&db_pool, a, "  ", &[b]).await.unwrap_err();
    assert!(matches!(err, MembershipError::InvalidInput(_)), "got {err}");

    let err = membership::create_group_chat(&db_pool, a, "squad", &[]).await.unwrap_err();
    assert!(matches!(err, MembershipError::InvalidInput(_)), "got {err}");

    let err = membership::create_group_chat(&db_pool, a, "squad", &[Uuid::now_v7()])
        .await
        .unwrap_err();
    assert!(matches!(err, MembershipError::NotFound(Entity::User)), "got {err}");

    let err = membership::create_private_chat(&db_pool, a, Uuid::now_v7()).await.unwrap_err();
    assert!(matches!(err, MembershipError::NotFound(Entity::User)), "got {err}");
}

#[test_log::test(tokio::test)]
async fn leaving_a_missing_chat_is_not_found() {
    let db_pool = test_pool().await;
    let user = seed_user(&db_pool, "u").await;

    let err = membership::leave_group(&db_pool, Uuid::now_v7(), user).await.unwrap_err();
    assert!(matches!(err, MembershipError::NotFound(Entity::Chat)), "got {err}");
}

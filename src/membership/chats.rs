use serde::Serialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{is_unique_violation, now_ts, with_deadline, Entity, MembershipError, MembershipResult};

/// Relation of a user to a chat. Pending means invited but not yet accepted;
/// only group chats ever hold pending rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatState {
    Pending,
    Active,
}

impl ChatState {
    pub fn as_str(self) -> &'static str {
        match self {
            ChatState::Pending => "pending",
            ChatState::Active => "active",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRecord {
    pub id: Uuid,
    pub is_group: bool,
    pub name: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMembership {
    pub chat_id: Uuid,
    pub user_id: Uuid,
    pub state: ChatState,
    pub joined_at: Option<i64>,
}

async fn user_exists(db_pool: &SqlitePool, user_id: Uuid) -> MembershipResult<bool> {
    Ok(sqlx::query("SELECT 1 FROM users WHERE id=?")
        .bind(user_id.to_string())
        .fetch_optional(db_pool)
        .await?
        .is_some())
}

async fn fetch_chat(db_pool: &SqlitePool, chat_id: Uuid) -> MembershipResult<ChatRecord> {
    let Some((is_group, name, created_at)): Option<(bool, Option<String>, i64)> =
        sqlx::query_as("SELECT is_group,name,created_at FROM chats WHERE id=?")
            .bind(chat_id.to_string())
            .fetch_optional(db_pool)
            .await?
    else {
        return Err(MembershipError::NotFound(Entity::Chat));
    };

    Ok(ChatRecord { id: chat_id, is_group, name, created_at })
}

/// A private chat has no invitation phase: both participants are active from
/// the start, and the chat stores no canonical name (each viewer sees the
/// other participant's username).
pub async fn create_private_chat(
    db_pool: &SqlitePool,
    caller: Uuid,
    other: Uuid,
) -> MembershipResult<ChatRecord> {
    with_deadline(async {
        if caller == other {
            return Err(MembershipError::InvalidInput("cannot open a chat with yourself"));
        }
        if !user_exists(db_pool, other).await? {
            return Err(MembershipError::NotFound(Entity::User));
        }

        let chat_id = Uuid::now_v7();
        let created_at = now_ts();

        let mut tx = db_pool.begin().await?;
        sqlx::query("INSERT INTO chats (id,is_group,name,created_at) VALUES (?,0,NULL,?)")
            .bind(chat_id.to_string())
            .bind(created_at)
            .execute(&mut *tx)
            .await?;
        for member in [caller, other] {
            sqlx::query(
                "INSERT INTO chat_members (chat_id,user_id,state,joined_at) VALUES (?,?,?,?)",
            )
            .bind(chat_id.to_string())
            .bind(member.to_string())
            .bind(ChatState::Active.as_str())
            .bind(created_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        tracing::debug!(%chat_id, %caller, %other, "private chat created");
        Ok(ChatRecord { id: chat_id, is_group: false, name: None, created_at })
    })
    .await
}

/// The creator and the initially listed members are immediately active;
/// only users added later through an invitation go through the pending state.
pub async fn create_group_chat(
    db_pool: &SqlitePool,
    caller: Uuid,
    name: &str,
    member_ids: &[Uuid],
) -> MembershipResult<ChatRecord> {
    with_deadline(async {
        let name = name.trim();
        if name.is_empty() {
            return Err(MembershipError::InvalidInput("group chat name must not be empty"));
        }
        if member_ids.is_empty() {
            return Err(MembershipError::InvalidInput(
                "a group chat needs at least one other member",
            ));
        }

        let mut members = vec![caller];
        for &member in member_ids {
            if !members.contains(&member) {
                members.push(member);
            }
        }
        for &member in &members {
            if member != caller && !user_exists(db_pool, member).await? {
                return Err(MembershipError::NotFound(Entity::User));
            }
        }

        let chat_id = Uuid::now_v7();
        let created_at = now_ts();

        let mut tx = db_pool.begin().await?;
        sqlx::query("INSERT INTO chats (id,is_group,name,created_at) VALUES (?,1,?,?)")
            .bind(chat_id.to_string())
            .bind(name)
            .bind(created_at)
            .execute(&mut *tx)
            .await?;
        for member in &members {
            sqlx::query(
                "INSERT INTO chat_members (chat_id,user_id,state,joined_at) VALUES (?,?,?,?)",
            )
            .bind(chat_id.to_string())
            .bind(member.to_string())
            .bind(ChatState::Active.as_str())
            .bind(created_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        tracing::debug!(%chat_id, %caller, members = members.len(), "group chat created");
        Ok(ChatRecord { id: chat_id, is_group: true, name: Some(name.to_owned()), created_at })
    })
    .await
}

pub async fn invite_to_group(
    db_pool: &SqlitePool,
    chat_id: Uuid,
    inviter: Uuid,
    invitee: Uuid,
) -> MembershipResult<ChatMembership> {
    with_deadline(async {
        let chat = fetch_chat(db_pool, chat_id).await?;
        if !chat.is_group {
            return Err(MembershipError::NotAGroupChat);
        }

        if sqlx::query("SELECT 1 FROM chat_members WHERE chat_id=? AND user_id=? AND state=?")
            .bind(chat_id.to_string())
            .bind(inviter.to_string())
            .bind(ChatState::Active.as_str())
            .fetch_optional(db_pool)
            .await?
            .is_none()
        {
            return Err(MembershipError::InviterNotMember);
        }

        if !user_exists(db_pool, invitee).await? {
            return Err(MembershipError::NotFound(Entity::User));
        }

        // The pair key is unique across both states, so a second invite (or an
        // invite to an active member) trips the primary key.
        let inserted = sqlx::query(
            "INSERT INTO chat_members (chat_id,user_id,state,joined_at) VALUES (?,?,?,NULL)",
        )
        .bind(chat_id.to_string())
        .bind(invitee.to_string())
        .bind(ChatState::Pending.as_str())
        .execute(db_pool)
        .await;

        match inserted {
            Ok(_) => {
                tracing::debug!(%chat_id, %inviter, %invitee, "invitation created");
                Ok(ChatMembership {
                    chat_id,
                    user_id: invitee,
                    state: ChatState::Pending,
                    joined_at: None,
                })
            }
            Err(e) if is_unique_violation(&e) => Err(MembershipError::AlreadyInvitedOrMember),
            Err(e) => Err(e.into()),
        }
    })
    .await
}

/// The pending→active transition is the only in-place mutation in the
/// relationship tables, and it stamps `joined_at`.
pub async fn accept_invitation(
    db_pool: &SqlitePool,
    chat_id: Uuid,
    user_id: Uuid,
) -> MembershipResult<ChatRecord> {
    with_deadline(async {
        let done = sqlx::query(
            "UPDATE chat_members SET state=?, joined_at=? WHERE chat_id=? AND user_id=? AND state=?",
        )
        .bind(ChatState::Active.as_str())
        .bind(now_ts())
        .bind(chat_id.to_string())
        .bind(user_id.to_string())
        .bind(ChatState::Pending.as_str())
        .execute(db_pool)
        .await?;

        if done.rows_affected() == 0 {
            return Err(MembershipError::NoPendingInvitation);
        }

        tracing::debug!(%chat_id, %user_id, "invitation accepted");
        fetch_chat(db_pool, chat_id).await
    })
    .await
}

pub async fn reject_invitation(
    db_pool: &SqlitePool,
    chat_id: Uuid,
    user_id: Uuid,
) -> MembershipResult<()> {
    with_deadline(async {
        let done = sqlx::query("DELETE FROM chat_members WHERE chat_id=? AND user_id=? AND state=?")
            .bind(chat_id.to_string())
            .bind(user_id.to_string())
            .bind(ChatState::Pending.as_str())
            .execute(db_pool)
            .await?;

        if done.rows_affected() == 0 {
            return Err(MembershipError::NoPendingInvitation);
        }

        tracing::debug!(%chat_id, %user_id, "invitation rejected");
        // The rejected row can have been the chat's last relation.
        collect_if_empty(db_pool, chat_id).await?;
        Ok(())
    })
    .await
}

/// Collects a chat that no relation row (active or pending) points at any
/// more, together with its messages. The emptiness check and the delete are
/// one statement, so a chat is never deleted while a concurrent invite or
/// join still holds a row.
async fn collect_if_empty(db_pool: &SqlitePool, chat_id: Uuid) -> MembershipResult<()> {
    let collected = sqlx::query(
        "DELETE FROM chats WHERE id=?1 \
         AND NOT EXISTS (SELECT 1 FROM chat_members WHERE chat_id=?1)",
    )
    .bind(chat_id.to_string())
    .execute(db_pool)
    .await?;

    if collected.rows_affected() > 0 {
        sqlx::query(
            "DELETE FROM messages WHERE chat_id=?1 \
             AND NOT EXISTS (SELECT 1 FROM chats WHERE id=?1)",
        )
        .bind(chat_id.to_string())
        .execute(db_pool)
        .await?;
        tracing::debug!(%chat_id, "empty chat collected");
    }

    Ok(())
}

/// Removes the caller's relation to the chat in any state, then collects the
/// chat if that was its last relation row.
pub async fn leave_group(
    db_pool: &SqlitePool,
    chat_id: Uuid,
    user_id: Uuid,
) -> MembershipResult<()> {
    with_deadline(async {
        if sqlx::query("SELECT 1 FROM chats WHERE id=?")
            .bind(chat_id.to_string())
            .fetch_optional(db_pool)
            .await?
            .is_none()
        {
            return Err(MembershipError::NotFound(Entity::Chat));
        }

        sqlx::query("DELETE FROM chat_members WHERE chat_id=? AND user_id=?")
            .bind(chat_id.to_string())
            .bind(user_id.to_string())
            .execute(db_pool)
            .await?;

        collect_if_empty(db_pool, chat_id).await
    })
    .await
}

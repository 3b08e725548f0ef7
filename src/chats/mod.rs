mod invite;
pub mod msg;
mod new;
mod ws;

use axum::{debug_handler, extract::{Path, State}, routing::{get, post}, Json, Router};
use serde::Serialize;
use sqlx::SqlitePool;
use tower_sessions::Session;
use uuid::Uuid;

use crate::membership::{Entity, MembershipError};
use crate::{session, AppResult, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_chats))
        .route("/private", post(new::create_private))
        .route("/group", post(new::create_group))
        .route("/{id}", get(get_chat))
        .route("/{id}/invite", post(invite::invite))
        .route("/{id}/accept", post(invite::accept))
        .route("/{id}/reject", post(invite::reject))
        .route("/{id}/leave", axum::routing::delete(invite::leave))
        .route("/{id}/messages", get(msg::list_messages).post(msg::send_message))
        .route("/{id}/ws", get(ws::chat_ws))
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatSummary {
    id: String,
    is_group: bool,
    /// For a private chat this is the other participant's username, resolved
    /// per viewer; the store holds no canonical name for private chats.
    name: Option<String>,
    state: String,
    joined_at: Option<i64>,
    created_at: i64,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatMemberView {
    user_id: String,
    username: String,
    state: String,
    joined_at: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatDetail {
    #[serde(flatten)]
    summary: ChatSummary,
    members: Vec<ChatMemberView>,
}

async fn display_name(
    db_pool: &SqlitePool,
    chat_id: &str,
    viewer: Uuid,
) -> Result<Option<String>, sqlx::Error> {
    let other: Option<(String,)> = sqlx::query_as(
        "SELECT u.username FROM chat_members cm JOIN users u ON u.id=cm.user_id \
         WHERE cm.chat_id=? AND cm.user_id<>?",
    )
    .bind(chat_id)
    .bind(viewer.to_string())
    .fetch_optional(db_pool)
    .await?;

    Ok(other.map(|(username,)| username))
}

#[debug_handler]
pub(crate) async fn list_chats(
    State(db_pool): State<SqlitePool>,
    session: Session,
) -> AppResult<Json<Vec<ChatSummary>>> {
    let caller = session::current_user(&session).await?;

    let rows: Vec<(String, bool, Option<String>, String, Option<i64>, i64)> = sqlx::query_as(
        "SELECT c.id, c.is_group, c.name, cm.state, cm.joined_at, c.created_at \
         FROM chats c JOIN chat_members cm ON cm.chat_id=c.id \
         WHERE cm.user_id=? ORDER BY c.created_at DESC",
    )
    .bind(caller.to_string())
    .fetch_all(&db_pool)
    .await?;

    let mut chats = Vec::with_capacity(rows.len());
    for (id, is_group, name, state, joined_at, created_at) in rows {
        let name = if is_group { name } else { display_name(&db_pool, &id, caller).await? };
        chats.push(ChatSummary { id, is_group, name, state, joined_at, created_at });
    }

    Ok(Json(chats))
}

#[debug_handler]
pub(crate) async fn get_chat(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Path(chat_id): Path<Uuid>,
) -> AppResult<Json<ChatDetail>> {
    let caller = session::current_user(&session).await?;

    // A chat is only visible to users holding a relation row, pending included.
    let Some((id, is_group, name, state, joined_at, created_at)): Option<(
        String,
        bool,
        Option<String>,
        String,
        Option<i64>,
        i64,
    )> = sqlx::query_as(
        "SELECT c.id, c.is_group, c.name, cm.state, cm.joined_at, c.created_at \
         FROM chats c JOIN chat_members cm ON cm.chat_id=c.id \
         WHERE c.id=? AND cm.user_id=?",
    )
    .bind(chat_id.to_string())
    .bind(caller.to_string())
    .fetch_optional(&db_pool)
    .await?
    else {
        return Err(MembershipError::NotFound(Entity::Chat).into());
    };

    let name = if is_group { name } else { display_name(&db_pool, &id, caller).await? };

    let members: Vec<(String, String, String, Option<i64>)> = sqlx::query_as(
        "SELECT cm.user_id, u.username, cm.state, cm.joined_at \
         FROM chat_members cm JOIN users u ON u.id=cm.user_id \
         WHERE cm.chat_id=? ORDER BY cm.joined_at ASC",
    )
    .bind(chat_id.to_string())
    .fetch_all(&db_pool)
    .await?;

    Ok(Json(ChatDetail {
        summary: ChatSummary { id, is_group, name, state, joined_at, created_at },
        members: members
            .into_iter()
            .map(|(user_id, username, state, joined_at)| ChatMemberView {
                user_id,
                username,
                state,
                joined_at,
            })
            .collect(),
    }))
}


/// Gate for reading or writing messages: requires an active relation row.
pub(crate) async fn require_active_member(
    db_pool: &SqlitePool,
    chat_id: Uuid,
    user_id: Uuid,
) -> AppResult<()> {
    if sqlx::query("SELECT 1 FROM chats WHERE id=?")
        .bind(chat_id.to_string())
        .fetch_optional(db_pool)
        .await?
        .is_none()
    {
        return Err(MembershipError::NotFound(Entity::Chat).into());
    }

    if sqlx::query("SELECT 1 FROM chat_members WHERE chat_id=? AND user_id=? AND state='active'")
        .bind(chat_id.to_string())
        .bind(user_id.to_string())
        .fetch_optional(db_pool)
        .await?
        .is_none()
    {
        return Err(MembershipError::NotAMember.into());
    }

    Ok(())
}

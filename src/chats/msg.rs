use axum::{debug_handler, extract::{Path, State}, Json};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use time::OffsetDateTime;
use tokio::sync::broadcast;
use tower_sessions::Session;
use uuid::Uuid;

use crate::{session, AppError, AppResult, AppState};

/// Stored message plus its sender's username; also the payload fanned out on
/// the broadcast channel to live websocket subscribers.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub id: String,
    pub chat_id: String,
    pub sender_id: String,
    pub sender_username: String,
    pub content: String,
    pub sent_at: i64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SendMessageRequest {
    pub(crate) content: String,
}

pub(crate) async fn store_message(
    db_pool: &SqlitePool,
    tx: &broadcast::Sender<ChatMessage>,

    chat_id: Uuid,
    sender_id: Uuid,
    content: &str,
) -> AppResult<ChatMessage> {
    let content = content.trim();
    if content.is_empty() {
        return Err(AppError::InvalidInput("message must not be empty"));
    }

    let (sender_username,): (String,) = sqlx::query_as("SELECT username FROM users WHERE id=?")
        .bind(sender_id.to_string())
        .fetch_one(db_pool)
        .await?;

    let id = Uuid::now_v7();
    let sent_at = OffsetDateTime::now_utc().unix_timestamp();
    sqlx::query("INSERT INTO messages (id,chat_id,sender_id,content,sent_at) VALUES (?,?,?,?,?)")
        .bind(id.to_string())
        .bind(chat_id.to_string())
        .bind(sender_id.to_string())
        .bind(content)
        .bind(sent_at)
        .execute(db_pool)
        .await?;

    let message = ChatMessage {
        id: id.to_string(),
        chat_id: chat_id.to_string(),
        sender_id: sender_id.to_string(),
        sender_username,
        content: content.to_owned(),
        sent_at,
    };

    // Nobody listening is fine.
    let _ = tx.send(message.clone());

    Ok(message)
}

#[debug_handler(state = AppState)]
pub(crate) async fn send_message(
    State(db_pool): State<SqlitePool>,
    State(tx): State<broadcast::Sender<ChatMessage>>,
    session: Session,
    Path(chat_id): Path<Uuid>,

    Json(SendMessageRequest { content }): Json<SendMessageRequest>,
) -> AppResult<Json<ChatMessage>> {
    let caller = session::current_user(&session).await?;
    super::require_active_member(&db_pool, chat_id, caller).await?;

    let message = store_message(&db_pool, &tx, chat_id, caller, &content).await?;
    Ok(Json(message))
}

#[debug_handler]
pub(crate) async fn list_messages(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Path(chat_id): Path<Uuid>,
) -> AppResult<Json<Vec<ChatMessage>>> {
    let caller = session::current_user(&session).await?;
    super::require_active_member(&db_pool, chat_id, caller).await?;

    let rows: Vec<(String, String, String, String, i64)> = sqlx::query_as(
        "SELECT m.id, m.sender_id, u.username, m.content, m.sent_at \
         FROM messages m JOIN users u ON u.id=m.sender_id \
         WHERE m.chat_id=? ORDER BY m.sent_at ASC, m.id ASC",
    )
    .bind(chat_id.to_string())
    .fetch_all(&db_pool)
    .await?;

    Ok(Json(
        rows.into_iter()
            .map(|(id, sender_id, sender_username, content, sent_at)| ChatMessage {
                id,
                chat_id: chat_id.to_string(),
                sender_id,
                sender_username,
                content,
                sent_at,
            })
            .collect(),
    ))
}

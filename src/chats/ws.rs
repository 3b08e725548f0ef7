use axum::{debug_handler, extract::{Path, State, WebSocketUpgrade}, response::Response};
use futures_util::{SinkExt, StreamExt};
use sqlx::SqlitePool;
use tokio::sync::broadcast;
use tower_sessions::Session;
use uuid::Uuid;

use super::msg::{self, ChatMessage, SendMessageRequest};
use crate::{session, AppResult, AppState};

/// Live message stream for one chat. Membership is checked before the
/// upgrade; the broadcast channel carries every chat's traffic and each
/// subscriber forwards only its own chat.
#[debug_handler(state = AppState)]
pub(crate) async fn chat_ws(
    Path(chat_id): Path<Uuid>,
    State(db_pool): State<SqlitePool>,
    State(tx): State<broadcast::Sender<ChatMessage>>,
    session: Session,

    ws: WebSocketUpgrade,
) -> AppResult<Response> {
    let caller = session::current_user(&session).await?;
    super::require_active_member(&db_pool, chat_id, caller).await?;

    Ok(ws.on_upgrade(move |stream| async move {
        let mut rx = tx.subscribe();
        let (mut sender, mut receiver) = stream.split();

        let chat = chat_id.to_string();
        let broadcast_task = tokio::spawn(async move {
            while let Ok(message) = rx.recv().await {
                if message.chat_id != chat {
                    continue;
                }
                let Ok(payload) = serde_json::to_string(&message) else {
                    continue;
                };
                if sender.send(payload.into()).await.is_err() {
                    break;
                }
            }
        });

        while let Some(Ok(frame)) = receiver.next().await {
            let Ok(SendMessageRequest { content }) = serde_json::from_slice(&frame.into_data())
            else {
                continue;
            };

            if let Err(e) = msg::store_message(&db_pool, &tx, chat_id, caller, &content).await {
                tracing::debug!(%chat_id, error = %e, "dropping websocket message");
            }
        }

        broadcast_task.abort();
    }))
}

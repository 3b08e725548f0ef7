use axum::{debug_handler, extract::State, Json};
use serde::Deserialize;
use sqlx::SqlitePool;
use tower_sessions::Session;
use uuid::Uuid;

use crate::membership::{self, ChatRecord};
use crate::{session, AppResult};

#[derive(Debug, Deserialize)]
pub(crate) struct NewPrivateChatRequest {
    user_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NewGroupChatRequest {
    name: String,
    member_ids: Vec<Uuid>,
}

#[debug_handler]
pub(crate) async fn create_private(
    State(db_pool): State<SqlitePool>,
    session: Session,

    Json(NewPrivateChatRequest { user_id }): Json<NewPrivateChatRequest>,
) -> AppResult<Json<ChatRecord>> {
    let caller = session::current_user(&session).await?;
    let chat = membership::create_private_chat(&db_pool, caller, user_id).await?;
    Ok(Json(chat))
}

#[debug_handler]
pub(crate) async fn create_group(
    State(db_pool): State<SqlitePool>,
    session: Session,

    Json(NewGroupChatRequest { name, member_ids }): Json<NewGroupChatRequest>,
) -> AppResult<Json<ChatRecord>> {
    let caller = session::current_user(&session).await?;
    let chat = membership::create_group_chat(&db_pool, caller, &name, &member_ids).await?;
    Ok(Json(chat))
}

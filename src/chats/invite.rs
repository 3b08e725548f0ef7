use axum::{debug_handler, extract::{Path, State}, http::StatusCode, response::IntoResponse, Json};
use serde::Deserialize;
use sqlx::SqlitePool;
use tower_sessions::Session;
use uuid::Uuid;

use crate::membership::{self, ChatMembership, ChatRecord};
use crate::{session, AppResult};

#[derive(Debug, Deserialize)]
pub(crate) struct InviteRequest {
    user_id: Uuid,
}

#[debug_handler]
pub(crate) async fn invite(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Path(chat_id): Path<Uuid>,

    Json(InviteRequest { user_id }): Json<InviteRequest>,
) -> AppResult<Json<ChatMembership>> {
    let caller = session::current_user(&session).await?;
    let record = membership::invite_to_group(&db_pool, chat_id, caller, user_id).await?;
    Ok(Json(record))
}

#[debug_handler]
pub(crate) async fn accept(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Path(chat_id): Path<Uuid>,
) -> AppResult<Json<ChatRecord>> {
    let caller = session::current_user(&session).await?;
    let chat = membership::accept_invitation(&db_pool, chat_id, caller).await?;
    Ok(Json(chat))
}

#[debug_handler]
pub(crate) async fn reject(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Path(chat_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let caller = session::current_user(&session).await?;
    membership::reject_invitation(&db_pool, chat_id, caller).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[debug_handler]
pub(crate) async fn leave(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Path(chat_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let caller = session::current_user(&session).await?;
    membership::leave_group(&db_pool, chat_id, caller).await?;
    Ok(StatusCode::NO_CONTENT)
}

use axum::{debug_handler, extract::{Path, State}, http::StatusCode, response::IntoResponse, Json};
use sqlx::SqlitePool;
use tower_sessions::Session;
use uuid::Uuid;

use crate::membership::{self, EventMembership};
use crate::{session, AppResult};

#[debug_handler]
pub(crate) async fn join_event(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Path(event_id): Path<Uuid>,
) -> AppResult<Json<EventMembership>> {
    let caller = session::current_user(&session).await?;
    let record = membership::join_event(&db_pool, event_id, caller).await?;
    Ok(Json(record))
}

#[debug_handler]
pub(crate) async fn leave_event(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Path(event_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let caller = session::current_user(&session).await?;
    membership::leave_event(&db_pool, event_id, caller).await?;
    Ok(StatusCode::NO_CONTENT)
}

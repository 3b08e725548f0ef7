use axum::{debug_handler, extract::State, Json};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use time::OffsetDateTime;
use tower_sessions::Session;
use uuid::Uuid;

use crate::{session, AppError, AppResult};

#[derive(Debug, Deserialize)]
pub(crate) struct NewEventRequest {
    title: String,
    location: String,
    starts_at: i64,
    max_participants: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(crate) struct NewEventResponse {
    id: Uuid,
    organizer_id: Uuid,
    title: String,
    location: String,
    starts_at: i64,
    max_participants: Option<i64>,
}

#[debug_handler]
pub(crate) async fn create_event(
    State(db_pool): State<SqlitePool>,
    session: Session,

    Json(NewEventRequest { title, location, starts_at, max_participants }): Json<NewEventRequest>,
) -> AppResult<Json<NewEventResponse>> {
    let caller = session::current_user(&session).await?;

    let title = title.trim().to_owned();
    if title.is_empty() {
        return Err(AppError::InvalidInput("event title must not be empty"));
    }
    if location.trim().is_empty() {
        return Err(AppError::InvalidInput("event location must not be empty"));
    }
    if matches!(max_participants, Some(n) if n < 1) {
        return Err(AppError::InvalidInput("max_participants must be at least 1"));
    }

    let id = Uuid::now_v7();
    sqlx::query(
        "INSERT INTO events (id,organizer_id,title,location,starts_at,max_participants,created_at) \
         VALUES (?,?,?,?,?,?,?)",
    )
    .bind(id.to_string())
    .bind(caller.to_string())
    .bind(&title)
    .bind(location.trim())
    .bind(starts_at)
    .bind(max_participants)
    .bind(OffsetDateTime::now_utc().unix_timestamp())
    .execute(&db_pool)
    .await?;

    tracing::info!(%id, organizer = %caller, "event created");

    Ok(Json(NewEventResponse {
        id,
        organizer_id: caller,
        title,
        location: location.trim().to_owned(),
        starts_at,
        max_participants,
    }))
}

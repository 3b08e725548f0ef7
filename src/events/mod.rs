mod join;
mod new;

use axum::{debug_handler, extract::{Path, State}, routing::{get, post}, Json, Router};
use serde::Serialize;
use sqlx::SqlitePool;
use tower_sessions::Session;
use uuid::Uuid;

use crate::membership::{Entity, MembershipError};
use crate::{session, AppResult, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_events).post(new::create_event))
        .route("/{id}", get(get_event))
        .route("/{id}/join", post(join::join_event).delete(join::leave_event))
}

#[derive(Debug, Serialize)]
pub(crate) struct EventView {
    id: String,
    organizer_id: String,
    organizer_username: String,
    title: String,
    location: String,
    starts_at: i64,
    max_participants: Option<i64>,
    member_count: i64,
    joined_by_me: bool,
}

type EventRow = (String, String, String, String, String, i64, Option<i64>, i64, bool);

fn event_view(row: EventRow) -> EventView {
    let (id, organizer_id, organizer_username, title, location, starts_at, max_participants, member_count, joined_by_me) =
        row;
    EventView {
        id,
        organizer_id,
        organizer_username,
        title,
        location,
        starts_at,
        max_participants,
        member_count,
        joined_by_me,
    }
}

const EVENT_COLUMNS: &str = "e.id, e.organizer_id, u.username, e.title, e.location, e.starts_at, \
     e.max_participants, \
     (SELECT COUNT(*) FROM event_members WHERE event_id=e.id), \
     EXISTS(SELECT 1 FROM event_members WHERE event_id=e.id AND user_id=?)";

#[debug_handler]
pub(crate) async fn list_events(
    State(db_pool): State<SqlitePool>,
    session: Session,
) -> AppResult<Json<Vec<EventView>>> {
    let caller = session::current_user(&session).await?;

    let rows: Vec<EventRow> = sqlx::query_as(&format!(
        "SELECT {EVENT_COLUMNS} FROM events e JOIN users u ON u.id=e.organizer_id \
         ORDER BY e.starts_at ASC",
    ))
    .bind(caller.to_string())
    .fetch_all(&db_pool)
    .await?;

    Ok(Json(rows.into_iter().map(event_view).collect()))
}

#[debug_handler]
pub(crate) async fn get_event(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Path(event_id): Path<Uuid>,
) -> AppResult<Json<EventView>> {
    let caller = session::current_user(&session).await?;

    let Some(row): Option<EventRow> = sqlx::query_as(&format!(
        "SELECT {EVENT_COLUMNS} FROM events e JOIN users u ON u.id=e.organizer_id WHERE e.id=?",
    ))
    .bind(caller.to_string())
    .bind(event_id.to_string())
    .fetch_optional(&db_pool)
    .await?
    else {
        return Err(MembershipError::NotFound(Entity::Event).into());
    };

    Ok(Json(event_view(row)))
}

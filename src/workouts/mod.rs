use axum::{debug_handler, extract::{Path, State}, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use time::OffsetDateTime;
use tower_sessions::Session;
use uuid::Uuid;

use crate::{session, AppError, AppResult, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_workouts).post(log_workout))
        .route("/{id}", axum::routing::delete(delete_workout))
}

#[derive(Debug, Deserialize)]
pub(crate) struct LogWorkoutRequest {
    activity: String,
    duration_min: i64,
    notes: Option<String>,
    /// Defaults to now when omitted.
    performed_at: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(crate) struct WorkoutView {
    id: String,
    activity: String,
    duration_min: i64,
    notes: Option<String>,
    performed_at: i64,
}

#[debug_handler]
pub(crate) async fn log_workout(
    State(db_pool): State<SqlitePool>,
    session: Session,

    Json(LogWorkoutRequest { activity, duration_min, notes, performed_at }): Json<LogWorkoutRequest>,
) -> AppResult<Json<WorkoutView>> {
    let caller = session::current_user(&session).await?;

    let activity = activity.trim().to_owned();
    if activity.is_empty() {
        return Err(AppError::InvalidInput("activity must not be empty"));
    }
    if duration_min < 1 {
        return Err(AppError::InvalidInput("duration must be at least one minute"));
    }

    let now = OffsetDateTime::now_utc().unix_timestamp();
    let performed_at = performed_at.unwrap_or(now);

    let id = Uuid::now_v7();
    sqlx::query(
        "INSERT INTO workouts (id,user_id,activity,duration_min,notes,performed_at,created_at) \
         VALUES (?,?,?,?,?,?,?)",
    )
    .bind(id.to_string())
    .bind(caller.to_string())
    .bind(&activity)
    .bind(duration_min)
    .bind(&notes)
    .bind(performed_at)
    .bind(now)
    .execute(&db_pool)
    .await?;

    Ok(Json(WorkoutView { id: id.to_string(), activity, duration_min, notes, performed_at }))
}

#[debug_handler]
pub(crate) async fn list_workouts(
    State(db_pool): State<SqlitePool>,
    session: Session,
) -> AppResult<Json<Vec<WorkoutView>>> {
    let caller = session::current_user(&session).await?;

    let rows: Vec<(String, String, i64, Option<String>, i64)> = sqlx::query_as(
        "SELECT id,activity,duration_min,notes,performed_at FROM workouts \
         WHERE user_id=? ORDER BY performed_at DESC, id DESC",
    )
    .bind(caller.to_string())
    .fetch_all(&db_pool)
    .await?;

    Ok(Json(
        rows.into_iter()
            .map(|(id, activity, duration_min, notes, performed_at)| WorkoutView {
                id,
                activity,
                duration_min,
                notes,
                performed_at,
            })
            .collect(),
    ))
}

#[debug_handler]
pub(crate) async fn delete_workout(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Path(workout_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let caller = session::current_user(&session).await?;

    let done = sqlx::query("DELETE FROM workouts WHERE id=? AND user_id=?")
        .bind(workout_id.to_string())
        .bind(caller.to_string())
        .execute(&db_pool)
        .await?;

    if done.rows_affected() == 0 {
        return Err(AppError::NotFound("workout"));
    }

    Ok(StatusCode::NO_CONTENT)
}

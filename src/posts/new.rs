use axum::{debug_handler, extract::State, Json};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use time::OffsetDateTime;
use tower_sessions::Session;
use uuid::Uuid;

use crate::{session, AppError, AppResult};

#[derive(Debug, Deserialize)]
pub(crate) struct NewPostRequest {
    content: String,
    /// Opaque reference into the blob store; no upload handling here.
    image_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct NewPostResponse {
    id: Uuid,
    author_id: Uuid,
    content: String,
    image_url: Option<String>,
    created_at: i64,
}

#[debug_handler]
pub(crate) async fn create_post(
    State(db_pool): State<SqlitePool>,
    session: Session,

    Json(NewPostRequest { content, image_url }): Json<NewPostRequest>,
) -> AppResult<Json<NewPostResponse>> {
    let caller = session::current_user(&session).await?;

    let content = content.trim().to_owned();
    if content.is_empty() {
        return Err(AppError::InvalidInput("post content must not be empty"));
    }

    let id = Uuid::now_v7();
    let created_at = OffsetDateTime::now_utc().unix_timestamp();
    sqlx::query("INSERT INTO posts (id,author_id,content,image_url,created_at) VALUES (?,?,?,?,?)")
        .bind(id.to_string())
        .bind(caller.to_string())
        .bind(&content)
        .bind(&image_url)
        .bind(created_at)
        .execute(&db_pool)
        .await?;

    tracing::debug!(%id, author = %caller, "post created");

    Ok(Json(NewPostResponse { id, author_id: caller, content, image_url, created_at }))
}

//! Moderation surface; every route requires the admin role.

use axum::{debug_handler, extract::{Path, State}, http::StatusCode, response::IntoResponse, routing::{delete, get}, Json, Router};
use serde::Serialize;
use sqlx::SqlitePool;
use tower_sessions::Session;
use uuid::Uuid;

use crate::{session, AppError, AppResult, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/{id}", delete(delete_user))
        .route("/posts/{id}", delete(delete_post))
        .route("/comments/{id}", delete(delete_comment))
}

#[derive(Debug, Serialize)]
pub(crate) struct UserRow {
    id: String,
    username: String,
    role: String,
    created_at: i64,
}

#[debug_handler]
pub(crate) async fn list_users(
    State(db_pool): State<SqlitePool>,
    session: Session,
) -> AppResult<Json<Vec<UserRow>>> {
    session::require_admin(&session, &db_pool).await?;

    let rows: Vec<(String, String, String, i64)> =
        sqlx::query_as("SELECT id,username,role,created_at FROM users ORDER BY created_at ASC")
            .fetch_all(&db_pool)
            .await?;

    Ok(Json(
        rows.into_iter()
            .map(|(id, username, role, created_at)| UserRow { id, username, role, created_at })
            .collect(),
    ))
}

#[debug_handler]
pub(crate) async fn delete_post(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Path(post_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let admin = session::require_admin(&session, &db_pool).await?;

    let mut tx = db_pool.begin().await?;
    sqlx::query("DELETE FROM post_likes WHERE post_id=?")
        .bind(post_id.to_string())
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM comments WHERE post_id=?")
        .bind(post_id.to_string())
        .execute(&mut *tx)
        .await?;
    let done = sqlx::query("DELETE FROM posts WHERE id=?")
        .bind(post_id.to_string())
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    if done.rows_affected() == 0 {
        return Err(AppError::NotFound("post"));
    }

    tracing::info!(%post_id, %admin, "post removed by moderation");
    Ok(StatusCode::NO_CONTENT)
}

#[debug_handler]
pub(crate) async fn delete_comment(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Path(comment_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let admin = session::require_admin(&session, &db_pool).await?;

    let done = sqlx::query("DELETE FROM comments WHERE id=?")
        .bind(comment_id.to_string())
        .execute(&db_pool)
        .await?;

    if done.rows_affected() == 0 {
        return Err(AppError::NotFound("comment"));
    }

    tracing::info!(%comment_id, %admin, "comment removed by moderation");
    Ok(StatusCode::NO_CONTENT)
}

#[debug_handler]
pub(crate) async fn delete_user(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Path(user_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let admin = session::require_admin(&session, &db_pool).await?;
    if admin == user_id {
        return Err(AppError::InvalidInput("admins cannot delete their own account"));
    }

    if !purge_user(&db_pool, user_id).await? {
        return Err(AppError::NotFound("user"));
    }

    tracing::info!(%user_id, %admin, "user removed with cascading cleanup");
    Ok(StatusCode::NO_CONTENT)
}

/// A user is never removed without cascading membership cleanup: their posts
/// (with comments and likes), their own comments and likes, follow edges in
/// both directions, event and chat memberships, messages and workouts all go
/// in one transaction, and chats left without any relation row are collected.
pub(crate) async fn purge_user(db_pool: &SqlitePool, user_id: Uuid) -> Result<bool, sqlx::Error> {
    let uid = user_id.to_string();
    let mut tx = db_pool.begin().await?;

    sqlx::query(
        "DELETE FROM post_likes WHERE user_id=?1 \
         OR post_id IN (SELECT id FROM posts WHERE author_id=?1)",
    )
    .bind(&uid)
    .execute(&mut *tx)
    .await?;
    sqlx::query(
        "DELETE FROM comments WHERE author_id=?1 \
         OR post_id IN (SELECT id FROM posts WHERE author_id=?1)",
    )
    .bind(&uid)
    .execute(&mut *tx)
    .await?;
    sqlx::query("DELETE FROM posts WHERE author_id=?")
        .bind(&uid)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM user_followers WHERE user_id=?1 OR following_id=?1")
        .bind(&uid)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM event_members WHERE user_id=?")
        .bind(&uid)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM workouts WHERE user_id=?")
        .bind(&uid)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM messages WHERE sender_id=?")
        .bind(&uid)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM chat_members WHERE user_id=?")
        .bind(&uid)
        .execute(&mut *tx)
        .await?;
    sqlx::query(
        "DELETE FROM chats WHERE NOT EXISTS \
         (SELECT 1 FROM chat_members WHERE chat_id=chats.id)",
    )
    .execute(&mut *tx)
    .await?;
    sqlx::query(
        "DELETE FROM messages WHERE NOT EXISTS \
         (SELECT 1 FROM chats WHERE id=messages.chat_id)",
    )
    .execute(&mut *tx)
    .await?;

    let done = sqlx::query("DELETE FROM users WHERE id=?").bind(&uid).execute(&mut *tx).await?;
    tx.commit().await?;

    Ok(done.rows_affected() > 0)
}

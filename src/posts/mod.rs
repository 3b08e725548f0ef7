mod new;

use axum::{debug_handler, extract::{Path, State}, http::StatusCode, response::IntoResponse, routing::{get, post}, Json, Router};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use time::OffsetDateTime;
use tower_sessions::Session;
use uuid::Uuid;

use crate::feed::{self, CommentView, FeedPost, PostDetail};
use crate::membership::{self, Entity, LikeAction, MembershipError};
use crate::{session, AppError, AppResult, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(new::create_post))
        .route("/feed", get(get_feed))
        .route("/{id}", get(get_post).delete(delete_post))
        .route("/{id}/comments", post(add_comment))
        .route("/{id}/like", post(toggle_like))
}

const FEED_LIMIT: i64 = 50;

#[debug_handler]
pub(crate) async fn get_feed(
    State(db_pool): State<SqlitePool>,
    session: Session,
) -> AppResult<Json<Vec<FeedPost>>> {
    let caller = session::current_user(&session).await?;
    let posts = feed::recent_posts(&db_pool, caller, FEED_LIMIT).await?;
    Ok(Json(posts))
}

#[debug_handler]
pub(crate) async fn get_post(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Path(post_id): Path<Uuid>,
) -> AppResult<Json<PostDetail>> {
    let caller = session::current_user(&session).await?;
    let detail = feed::post_detail(&db_pool, caller, post_id).await?;
    Ok(Json(detail))
}

#[debug_handler]
pub(crate) async fn delete_post(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Path(post_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let caller = session::current_user(&session).await?;

    let Some((author_id,)): Option<(String,)> =
        sqlx::query_as("SELECT author_id FROM posts WHERE id=?")
            .bind(post_id.to_string())
            .fetch_optional(&db_pool)
            .await?
    else {
        return Err(MembershipError::NotFound(Entity::Post).into());
    };

    if author_id != caller.to_string() {
        return Err(AppError::Forbidden);
    }

    let mut tx = db_pool.begin().await?;
    sqlx::query("DELETE FROM post_likes WHERE post_id=?")
        .bind(post_id.to_string())
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM comments WHERE post_id=?")
        .bind(post_id.to_string())
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM posts WHERE id=?")
        .bind(post_id.to_string())
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub(crate) struct NewCommentRequest {
    content: String,
}

#[debug_handler]
pub(crate) async fn add_comment(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Path(post_id): Path<Uuid>,

    Json(NewCommentRequest { content }): Json<NewCommentRequest>,
) -> AppResult<Json<CommentView>> {
    let caller = session::current_user(&session).await?;

    let content = content.trim().to_owned();
    if content.is_empty() {
        return Err(AppError::InvalidInput("comment must not be empty"));
    }

    if sqlx::query("SELECT 1 FROM posts WHERE id=?")
        .bind(post_id.to_string())
        .fetch_optional(&db_pool)
        .await?
        .is_none()
    {
        return Err(MembershipError::NotFound(Entity::Post).into());
    }

    let (author_username,): (String,) = sqlx::query_as("SELECT username FROM users WHERE id=?")
        .bind(caller.to_string())
        .fetch_one(&db_pool)
        .await?;

    let id = Uuid::now_v7();
    let created_at = OffsetDateTime::now_utc().unix_timestamp();
    sqlx::query("INSERT INTO comments (id,post_id,author_id,content,created_at) VALUES (?,?,?,?,?)")
        .bind(id.to_string())
        .bind(post_id.to_string())
        .bind(caller.to_string())
        .bind(&content)
        .bind(created_at)
        .execute(&db_pool)
        .await?;

    Ok(Json(CommentView {
        id: id.to_string(),
        author_id: caller.to_string(),
        author_username,
        content,
        created_at,
    }))
}

#[derive(Debug, Serialize)]
pub(crate) struct LikeResponse {
    action: LikeAction,
}

#[debug_handler]
pub(crate) async fn toggle_like(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Path(post_id): Path<Uuid>,
) -> AppResult<Json<LikeResponse>> {
    let caller = session::current_user(&session).await?;
    let action = membership::toggle_like(&db_pool, post_id, caller).await?;
    Ok(Json(LikeResponse { action }))
}

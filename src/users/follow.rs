use axum::{debug_handler, extract::{Path, State}, Json};
use serde::Serialize;
use sqlx::SqlitePool;
use tower_sessions::Session;
use uuid::Uuid;

use crate::{membership, session, AppResult};

/// Follow and unfollow are distinct operations that reject redundant
/// application, unlike the like toggle.
#[derive(Debug, Serialize)]
pub(crate) struct FollowResponse {
    action: &'static str,
}

#[debug_handler]
pub(crate) async fn follow(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Path(target): Path<Uuid>,
) -> AppResult<Json<FollowResponse>> {
    let caller = session::current_user(&session).await?;
    membership::follow(&db_pool, caller, target).await?;
    Ok(Json(FollowResponse { action: "followed" }))
}

#[debug_handler]
pub(crate) async fn unfollow(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Path(target): Path<Uuid>,
) -> AppResult<Json<FollowResponse>> {
    let caller = session::current_user(&session).await?;
    membership::unfollow(&db_pool, caller, target).await?;
    Ok(Json(FollowResponse { action: "unfollowed" }))
}

#[derive(Debug, Serialize)]
pub(crate) struct FollowerView {
    id: String,
    username: String,
}

#[debug_handler]
pub(crate) async fn followers(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<Vec<FollowerView>>> {
    session::current_user(&session).await?;

    let rows: Vec<(String, String)> = sqlx::query_as(
        "SELECT u.id, u.username FROM user_followers f JOIN users u ON u.id=f.user_id \
         WHERE f.following_id=? ORDER BY u.username ASC",
    )
    .bind(user_id.to_string())
    .fetch_all(&db_pool)
    .await?;

    Ok(Json(rows.into_iter().map(|(id, username)| FollowerView { id, username }).collect()))
}

#[debug_handler]
pub(crate) async fn following(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<Vec<FollowerView>>> {
    session::current_user(&session).await?;

    let rows: Vec<(String, String)> = sqlx::query_as(
        "SELECT u.id, u.username FROM user_followers f JOIN users u ON u.id=f.following_id \
         WHERE f.user_id=? ORDER BY u.username ASC",
    )
    .bind(user_id.to_string())
    .fetch_all(&db_pool)
    .await?;

    Ok(Json(rows.into_iter().map(|(id, username)| FollowerView { id, username }).collect()))
}

use axum::{debug_handler, extract::{Path, State}, Json};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tower_sessions::Session;
use uuid::Uuid;

use crate::membership::{Entity, MembershipError};
use crate::{session, AppError, AppResult};

#[derive(Debug, Serialize)]
pub(crate) struct ProfileView {
    id: String,
    username: String,
    role: String,
    bio: Option<String>,
    created_at: i64,
    follower_count: i64,
    following_count: i64,
    followed_by_me: bool,
}

async fn load_profile(
    db_pool: &SqlitePool,
    user_id: Uuid,
    viewer: Uuid,
) -> AppResult<ProfileView> {
    let Some((id, username, role, bio, created_at)): Option<(
        String,
        String,
        String,
        Option<String>,
        i64,
    )> = sqlx::query_as("SELECT id,username,role,bio,created_at FROM users WHERE id=?")
        .bind(user_id.to_string())
        .fetch_optional(db_pool)
        .await?
    else {
        return Err(MembershipError::NotFound(Entity::User).into());
    };

    let (follower_count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM user_followers WHERE following_id=?")
            .bind(user_id.to_string())
            .fetch_one(db_pool)
            .await?;
    let (following_count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM user_followers WHERE user_id=?")
            .bind(user_id.to_string())
            .fetch_one(db_pool)
            .await?;
    let followed_by_me = sqlx::query("SELECT 1 FROM user_followers WHERE user_id=? AND following_id=?")
        .bind(viewer.to_string())
        .bind(user_id.to_string())
        .fetch_optional(db_pool)
        .await?
        .is_some();

    Ok(ProfileView {
        id,
        username,
        role,
        bio,
        created_at,
        follower_count,
        following_count,
        followed_by_me,
    })
}

#[debug_handler]
pub(crate) async fn profile(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<ProfileView>> {
    let caller = session::current_user(&session).await?;
    Ok(Json(load_profile(&db_pool, user_id, caller).await?))
}

#[debug_handler]
pub(crate) async fn me(
    State(db_pool): State<SqlitePool>,
    session: Session,
) -> AppResult<Json<ProfileView>> {
    let caller = session::current_user(&session).await?;
    Ok(Json(load_profile(&db_pool, caller, caller).await?))
}

#[derive(Debug, Deserialize)]
pub(crate) struct UpdateProfileRequest {
    username: Option<String>,
    bio: Option<String>,
}

#[debug_handler]
pub(crate) async fn update_me(
    State(db_pool): State<SqlitePool>,
    session: Session,

    Json(UpdateProfileRequest { username, bio }): Json<UpdateProfileRequest>,
) -> AppResult<Json<ProfileView>> {
    let caller = session::current_user(&session).await?;

    if let Some(username) = &username {
        let username = username.trim();
        if username.is_empty() || username.len() > 32 {
            return Err(AppError::InvalidInput("username must be 1-32 characters"));
        }

        let updated = sqlx::query("UPDATE users SET username=? WHERE id=?")
            .bind(username)
            .bind(caller.to_string())
            .execute(&db_pool)
            .await;
        match updated {
            Ok(_) => {}
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                return Err(AppError::UsernameTaken);
            }
            Err(e) => return Err(e.into()),
        }
    }

    if let Some(bio) = &bio {
        sqlx::query("UPDATE users SET bio=? WHERE id=?")
            .bind(bio)
            .bind(caller.to_string())
            .execute(&db_pool)
            .await?;
    }

    Ok(Json(load_profile(&db_pool, caller, caller).await?))
}

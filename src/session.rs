use sqlx::SqlitePool;
use tower_sessions::Session;
use uuid::Uuid;

use crate::{AppError, AppResult};

pub const USER_ID: &str = "user_id";

/// Resolves the signed-in caller once per request; every query below the
/// boundary takes this id as an explicit argument.
pub async fn current_user(session: &Session) -> AppResult<Uuid> {
    let Some(id) = session.get::<String>(USER_ID).await? else {
        return Err(AppError::Unauthorized);
    };

    Uuid::parse_str(&id).map_err(|_| AppError::Unauthorized)
}

pub async fn require_admin(session: &Session, db_pool: &SqlitePool) -> AppResult<Uuid> {
    let caller = current_user(session).await?;

    let Some((role,)): Option<(String,)> = sqlx::query_as("SELECT role FROM users WHERE id=?")
        .bind(caller.to_string())
        .fetch_optional(db_pool)
        .await?
    else {
        return Err(AppError::Unauthorized);
    };

    if role != "admin" {
        return Err(AppError::Forbidden);
    }

    Ok(caller)
}

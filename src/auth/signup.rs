use axum::{debug_handler, extract::State, Json};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use time::OffsetDateTime;
use tower_sessions::Session;
use uuid::Uuid;

use crate::config::Config;
use crate::session::USER_ID;
use crate::{AppError, AppResult, AppState};

#[derive(Debug, Deserialize)]
pub(crate) struct SignupRequest {
    username: String,
    password: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct SignupResponse {
    id: Uuid,
    username: String,
    role: String,
}

#[debug_handler(state = AppState)]
pub(crate) async fn signup(
    State(db_pool): State<SqlitePool>,
    State(config): State<Config>,
    session: Session,

    Json(SignupRequest { username, password }): Json<SignupRequest>,
) -> AppResult<Json<SignupResponse>> {
    let username = username.trim().to_owned();
    if username.is_empty() || username.len() > 32 {
        return Err(AppError::InvalidInput("username must be 1-32 characters"));
    }
    if password.len() < 8 {
        return Err(AppError::InvalidInput("password must be at least 8 characters"));
    }

    let role = if config.admin_username.as_deref() == Some(username.as_str()) {
        "admin"
    } else {
        "user"
    };

    let id = Uuid::now_v7();
    let inserted = sqlx::query(
        "INSERT INTO users (id,username,password_hash,role,created_at) VALUES (?,?,?,?,?)",
    )
    .bind(id.to_string())
    .bind(&username)
    .bind(super::hash_password(&password)?)
    .bind(role)
    .bind(OffsetDateTime::now_utc().unix_timestamp())
    .execute(&db_pool)
    .await;

    match inserted {
        Ok(_) => {}
        Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
            return Err(AppError::UsernameTaken);
        }
        Err(e) => return Err(e.into()),
    }

    session.insert(USER_ID, id.to_string()).await?;
    tracing::info!(%id, username, role, "user signed up");

    Ok(Json(SignupResponse { id, username, role: role.to_owned() }))
}

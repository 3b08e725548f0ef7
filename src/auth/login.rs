use axum::{debug_handler, extract::State, Json};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tower_sessions::Session;
use uuid::Uuid;

use crate::session::USER_ID;
use crate::{AppError, AppResult};

#[derive(Debug, Deserialize)]
pub(crate) struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct LoginResponse {
    id: Uuid,
    username: String,
    role: String,
}

#[debug_handler]
pub(crate) async fn login(
    State(db_pool): State<SqlitePool>,
    session: Session,

    Json(LoginRequest { username, password }): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let Some((id, password_hash, role)): Option<(String, String, String)> =
        sqlx::query_as("SELECT id,password_hash,role FROM users WHERE username=?")
            .bind(&username)
            .fetch_optional(&db_pool)
            .await?
    else {
        return Err(AppError::InvalidCredentials);
    };

    if !super::verify_password(&password, &password_hash)? {
        return Err(AppError::InvalidCredentials);
    }

    session.insert(USER_ID, id.clone()).await?;
    tracing::info!(%id, username, "user signed in");

    let id = Uuid::parse_str(&id).map_err(|e| anyhow::anyhow!("stored user id: {e}"))?;
    Ok(Json(LoginResponse { id, username, role }))
}

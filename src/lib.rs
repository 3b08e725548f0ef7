pub mod admin;
pub mod auth;
pub mod chats;
pub mod config;
pub mod db;
pub mod events;
pub mod feed;
pub mod membership;
pub mod posts;
pub mod session;
pub mod users;
pub mod workouts;

use axum::{extract::FromRef, http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;
use sqlx::SqlitePool;
use tokio::sync::broadcast;

use crate::chats::msg::ChatMessage;
use crate::config::Config;
use crate::membership::MembershipError;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub config: Config,
    pub tx: broadcast::Sender<ChatMessage>,
}

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Membership(#[from] MembershipError),

    #[error("not signed in")]
    Unauthorized,

    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("username is already taken")]
    UsernameTaken,

    #[error("{0}")]
    InvalidInput(&'static str),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("admin role required")]
    Forbidden,

    #[error(transparent)]
    Store(#[from] sqlx::Error),

    #[error(transparent)]
    Session(#[from] tower_sessions::session::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Membership(e) => e.status(),
            AppError::Unauthorized | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::UsernameTaken => StatusCode::CONFLICT,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Store(_) | AppError::Session(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            AppError::Membership(e) => e.kind(),
            AppError::Unauthorized => "unauthorized",
            AppError::InvalidCredentials => "invalid_credentials",
            AppError::UsernameTaken => "username_taken",
            AppError::InvalidInput(_) => "invalid_input",
            AppError::NotFound(_) => "not_found",
            AppError::Forbidden => "forbidden",
            AppError::Store(_) => "store_unavailable",
            AppError::Session(_) | AppError::Internal(_) => "internal",
        }
    }
}

// The response body carries the machine-readable kind, never a backtrace.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }
        (status, Json(json!({ "error": self.kind(), "message": self.to_string() }))).into_response()
    }
}

use axum::{debug_handler, http::StatusCode, response::IntoResponse};
use tower_sessions::Session;

use crate::AppResult;

#[debug_handler]
pub(crate) async fn logout(session: Session) -> AppResult<impl IntoResponse> {
    session.flush().await?;
    Ok(StatusCode::NO_CONTENT)
}

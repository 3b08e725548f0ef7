mod follow;
mod profile;

use axum::{routing::{get, post}, Router};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/me", get(profile::me).put(profile::update_me))
        .route("/{id}", get(profile::profile))
        .route("/{id}/follow", post(follow::follow).delete(follow::unfollow))
        .route("/{id}/followers", get(follow::followers))
        .route("/{id}/following", get(follow::following))
}

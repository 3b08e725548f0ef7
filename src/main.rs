use axum::Router;
use fitconnect::{admin, auth, chats, config::Config, db, events, posts, users, workouts, AppState};
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_sessions::{cookie::SameSite, Expiry, MemoryStore, SessionManagerLayer};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,fitconnect=debug")),
        )
        .init();

    let config = Config::from_env();
    tracing::info!(?config, "configuration loaded");

    let db_pool = db::connect(&config.database_url).await?;
    db::init(&db_pool).await?;

    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(false)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::hours(12)));

    let app_state = AppState {
        db_pool,
        config: config.clone(),
        tx: broadcast::channel(256).0,
    };

    let app = Router::new()
        .nest("/auth", auth::router())
        .nest("/users", users::router())
        .nest("/posts", posts::router())
        .nest("/events", events::router())
        .nest("/chats", chats::router())
        .nest("/workouts", workouts::router())
        .nest("/admin", admin::router())
        .with_state(app_state)
        .layer(session_layer)
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}

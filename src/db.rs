use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;

pub async fn connect(database_url: &str) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5))
        .foreign_keys(true);

    let db_pool = SqlitePoolOptions::new()
        .max_connections(16)
        .connect_with(options)
        .await?;

    Ok(db_pool)
}

/// Idempotent schema init, run once at startup. Uuids are TEXT, timestamps are
/// unix seconds. Every relationship table keys on its pair so duplicates are
/// rejected by the store itself.
pub async fn init(db_pool: &SqlitePool) -> Result<(), sqlx::Error> {
    const SCHEMA: &[&str] = &[
        "CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'user' CHECK (role IN ('user','admin')),
            bio TEXT,
            created_at INTEGER NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS user_followers (
            user_id TEXT NOT NULL,
            following_id TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            PRIMARY KEY (user_id, following_id)
        )",
        "CREATE TABLE IF NOT EXISTS posts (
            id TEXT PRIMARY KEY,
            author_id TEXT NOT NULL,
            content TEXT NOT NULL,
            image_url TEXT,
            created_at INTEGER NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS comments (
            id TEXT PRIMARY KEY,
            post_id TEXT NOT NULL,
            author_id TEXT NOT NULL,
            content TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS post_likes (
            post_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            PRIMARY KEY (post_id, user_id)
        )",
        "CREATE TABLE IF NOT EXISTS events (
            id TEXT PRIMARY KEY,
            organizer_id TEXT NOT NULL,
            title TEXT NOT NULL,
            location TEXT NOT NULL,
            starts_at INTEGER NOT NULL,
            max_participants INTEGER,
            created_at INTEGER NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS event_members (
            event_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            joined_at INTEGER NOT NULL,
            PRIMARY KEY (event_id, user_id)
        )",
        "CREATE TABLE IF NOT EXISTS chats (
            id TEXT PRIMARY KEY,
            is_group INTEGER NOT NULL,
            name TEXT,
            created_at INTEGER NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS chat_members (
            chat_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            state TEXT NOT NULL CHECK (state IN ('pending','active')),
            joined_at INTEGER,
            PRIMARY KEY (chat_id, user_id)
        )",
        "CREATE TABLE IF NOT EXISTS messages (
            id TEXT PRIMARY KEY,
            chat_id TEXT NOT NULL,
            sender_id TEXT NOT NULL,
            content TEXT NOT NULL,
            sent_at INTEGER NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS workouts (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            activity TEXT NOT NULL,
            duration_min INTEGER NOT NULL,
            notes TEXT,
            performed_at INTEGER NOT NULL,
            created_at INTEGER NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS idx_posts_created ON posts (created_at DESC)",
        "CREATE INDEX IF NOT EXISTS idx_comments_post ON comments (post_id)",
        "CREATE INDEX IF NOT EXISTS idx_messages_chat ON messages (chat_id)",
        "CREATE INDEX IF NOT EXISTS idx_chat_members_user ON chat_members (user_id)",
        "CREATE INDEX IF NOT EXISTS idx_event_members_user ON event_members (user_id)",
    ];

    for stmt in SCHEMA {
        sqlx::query(stmt).execute(db_pool).await?;
    }

    Ok(())
}

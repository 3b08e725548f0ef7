//! Read-only aggregation of posts, counts and comment threads. The like-state
//! shown per post is the read side of the membership module's like toggles.

use serde::Serialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::membership::{Entity, MembershipError};
use crate::{AppError, AppResult};

#[derive(Debug, Clone, Serialize)]
pub struct FeedPost {
    pub id: String,
    pub author_id: String,
    pub author_username: String,
    pub content: String,
    pub image_url: Option<String>,
    pub created_at: i64,
    pub like_count: i64,
    pub comment_count: i64,
    pub liked_by_me: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentView {
    pub id: String,
    pub author_id: String,
    pub author_username: String,
    pub content: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostDetail {
    #[serde(flatten)]
    pub post: FeedPost,
    pub comments: Vec<CommentView>,
}

type FeedRow = (String, String, String, String, Option<String>, i64, i64, i64, bool);

fn feed_post(row: FeedRow) -> FeedPost {
    let (id, author_id, author_username, content, image_url, created_at, like_count, comment_count, liked_by_me) =
        row;
    FeedPost {
        id,
        author_id,
        author_username,
        content,
        image_url,
        created_at,
        like_count,
        comment_count,
        liked_by_me,
    }
}

const FEED_COLUMNS: &str = "p.id, p.author_id, u.username, p.content, p.image_url, p.created_at, \
     (SELECT COUNT(*) FROM post_likes WHERE post_id=p.id), \
     (SELECT COUNT(*) FROM comments WHERE post_id=p.id), \
     EXISTS(SELECT 1 FROM post_likes WHERE post_id=p.id AND user_id=?)";

pub async fn recent_posts(
    db_pool: &SqlitePool,
    viewer: Uuid,
    limit: i64,
) -> AppResult<Vec<FeedPost>> {
    let rows: Vec<FeedRow> = sqlx::query_as(&format!(
        "SELECT {FEED_COLUMNS} FROM posts p JOIN users u ON u.id=p.author_id \
         ORDER BY p.created_at DESC, p.id DESC LIMIT ?",
    ))
    .bind(viewer.to_string())
    .bind(limit)
    .fetch_all(db_pool)
    .await?;

    Ok(rows.into_iter().map(feed_post).collect())
}

pub async fn post_detail(
    db_pool: &SqlitePool,
    viewer: Uuid,
    post_id: Uuid,
) -> AppResult<PostDetail> {
    let Some(row): Option<FeedRow> = sqlx::query_as(&format!(
        "SELECT {FEED_COLUMNS} FROM posts p JOIN users u ON u.id=p.author_id WHERE p.id=?",
    ))
    .bind(viewer.to_string())
    .bind(post_id.to_string())
    .fetch_optional(db_pool)
    .await?
    else {
        return Err(AppError::Membership(MembershipError::NotFound(Entity::Post)));
    };

    let comments: Vec<(String, String, String, String, i64)> = sqlx::query_as(
        "SELECT c.id, c.author_id, u.username, c.content, c.created_at \
         FROM comments c JOIN users u ON u.id=c.author_id \
         WHERE c.post_id=? ORDER BY c.created_at ASC, c.id ASC",
    )
    .bind(post_id.to_string())
    .fetch_all(db_pool)
    .await?;

    Ok(PostDetail {
        post: feed_post(row),
        comments: comments
            .into_iter()
            .map(|(id, author_id, author_username, content, created_at)| CommentView {
                id,
                author_id,
                author_username,
                content,
                created_at,
            })
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::SqlitePool;
    use uuid::Uuid;

    use crate::{db, membership, AppError};

    async fn test_pool() -> SqlitePool {
        let db_pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory pool");
        db::init(&db_pool).await.expect("schema init");
        db_pool
    }

    async fn seed_user(db_pool: &SqlitePool, username: &str) -> Uuid {
        let id = Uuid::now_v7();
        sqlx::query(
            "INSERT INTO users (id,username,password_hash,role,created_at) VALUES (?,?,'x','user',0)",
        )
        .bind(id.to_string())
        .bind(username)
        .execute(db_pool)
        .await
        .expect("seed user");
        id
    }

    async fn seed_post(db_pool: &SqlitePool, author: Uuid, content: &str, created_at: i64) -> Uuid {
        let id = Uuid::now_v7();
        sqlx::query("INSERT INTO posts (id,author_id,content,created_at) VALUES (?,?,?,?)")
            .bind(id.to_string())
            .bind(author.to_string())
            .bind(content)
            .bind(created_at)
            .execute(db_pool)
            .await
            .expect("seed post");
        id
    }

    #[test_log::test(tokio::test)]
    async fn feed_carries_counts_and_viewer_like_state() {
        let db_pool = test_pool().await;
        let alice = seed_user(&db_pool, "alice").await;
        let bob = seed_user(&db_pool, "bob").await;

        let older = seed_post(&db_pool, alice, "rest day", 100).await;
        let newer = seed_post(&db_pool, bob, "new 5k pb", 200).await;

        membership::toggle_like(&db_pool, newer, alice).await.expect("alice likes");
        membership::toggle_like(&db_pool, newer, bob).await.expect("bob likes");
        sqlx::query(
            "INSERT INTO comments (id,post_id,author_id,content,created_at) VALUES (?,?,?,'gg',0)",
        )
        .bind(Uuid::now_v7().to_string())
        .bind(newer.to_string())
        .bind(alice.to_string())
        .execute(&db_pool)
        .await
        .expect("comment");

        let feed = super::recent_posts(&db_pool, alice, 50).await.expect("feed");
        assert_eq!(feed.len(), 2);

        // Newest first.
        assert_eq!(feed[0].id, newer.to_string());
        assert_eq!(feed[0].author_username, "bob");
        assert_eq!(feed[0].like_count, 2);
        assert_eq!(feed[0].comment_count, 1);
        assert!(feed[0].liked_by_me);

        assert_eq!(feed[1].id, older.to_string());
        assert_eq!(feed[1].like_count, 0);
        assert!(!feed[1].liked_by_me);

        // Bob sees the same counts but his own like-state.
        let feed = super::recent_posts(&db_pool, bob, 50).await.expect("feed");
        assert!(feed[0].liked_by_me);
        assert!(!feed[1].liked_by_me);
    }

    #[test_log::test(tokio::test)]
    async fn post_detail_threads_comments_in_order() {
        let db_pool = test_pool().await;
        let alice = seed_user(&db_pool, "alice").await;
        let post = seed_post(&db_pool, alice, "form check", 0).await;

        for (i, text) in ["first", "second"].iter().enumerate() {
            sqlx::query(
                "INSERT INTO comments (id,post_id,author_id,content,created_at) VALUES (?,?,?,?,?)",
            )
            .bind(Uuid::now_v7().to_string())
            .bind(post.to_string())
            .bind(alice.to_string())
            .bind(text)
            .bind(i as i64)
            .execute(&db_pool)
            .await
            .expect("comment");
        }

        let detail = super::post_detail(&db_pool, alice, post).await.expect("detail");
        assert_eq!(detail.post.comment_count, 2);
        assert_eq!(detail.comments.len(), 2);
        assert_eq!(detail.comments[0].content, "first");
        assert_eq!(detail.comments[1].content, "second");

        let err = super::post_detail(&db_pool, alice, Uuid::now_v7()).await.unwrap_err();
        assert!(matches!(err, AppError::Membership(_)), "got {err}");
    }
}

use serde::Serialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{is_unique_violation, now_ts, with_deadline, Entity, MembershipError, MembershipResult};

/// Outcome of a like toggle. Repeated calls alternate between the two with no
/// error path, unlike follow/unfollow which reject redundant application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LikeAction {
    Liked,
    Disliked,
}

pub async fn follow(db_pool: &SqlitePool, caller: Uuid, target: Uuid) -> MembershipResult<()> {
    with_deadline(async {
        if caller == target {
            return Err(MembershipError::SelfFollowForbidden);
        }

        if sqlx::query("SELECT 1 FROM users WHERE id=?")
            .bind(target.to_string())
            .fetch_optional(db_pool)
            .await?
            .is_none()
        {
            return Err(MembershipError::NotFound(Entity::User));
        }

        let inserted = sqlx::query(
            "INSERT INTO user_followers (user_id,following_id,created_at) VALUES (?,?,?)",
        )
        .bind(caller.to_string())
        .bind(target.to_string())
        .bind(now_ts())
        .execute(db_pool)
        .await;

        match inserted {
            Ok(_) => {
                tracing::debug!(%caller, %target, "follow edge created");
                Ok(())
            }
            Err(e) if is_unique_violation(&e) => Err(MembershipError::AlreadyFollowing),
            Err(e) => Err(e.into()),
        }
    })
    .await
}

pub async fn unfollow(db_pool: &SqlitePool, caller: Uuid, target: Uuid) -> MembershipResult<()> {
    with_deadline(async {
        let done = sqlx::query("DELETE FROM user_followers WHERE user_id=? AND following_id=?")
            .bind(caller.to_string())
            .bind(target.to_string())
            .execute(db_pool)
            .await?;

        if done.rows_affected() == 0 {
            return Err(MembershipError::NotFollowing);
        }

        tracing::debug!(%caller, %target, "follow edge removed");
        Ok(())
    })
    .await
}

pub async fn toggle_like(
    db_pool: &SqlitePool,
    post_id: Uuid,
    user_id: Uuid,
) -> MembershipResult<LikeAction> {
    with_deadline(async {
        if sqlx::query("SELECT 1 FROM posts WHERE id=?")
            .bind(post_id.to_string())
            .fetch_optional(db_pool)
            .await?
            .is_none()
        {
            return Err(MembershipError::NotFound(Entity::Post));
        }

        let removed = sqlx::query("DELETE FROM post_likes WHERE post_id=? AND user_id=?")
            .bind(post_id.to_string())
            .bind(user_id.to_string())
            .execute(db_pool)
            .await?;

        if removed.rows_affected() > 0 {
            return Ok(LikeAction::Disliked);
        }

        // OR IGNORE: if a concurrent duplicate call inserted first, the row is
        // already in the liked state and this call settles on the same answer.
        sqlx::query("INSERT OR IGNORE INTO post_likes (post_id,user_id,created_at) VALUES (?,?,?)")
            .bind(post_id.to_string())
            .bind(user_id.to_string())
            .bind(now_ts())
            .execute(db_pool)
            .await?;

        Ok(LikeAction::Liked)
    })
    .await
}

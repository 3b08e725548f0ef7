use serde::Serialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{is_unique_violation, now_ts, with_deadline, Entity, MembershipError, MembershipResult};

#[derive(Debug, Clone, Serialize)]
pub struct EventMembership {
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub joined_at: i64,
}

pub async fn join_event(
    db_pool: &SqlitePool,
    event_id: Uuid,
    user_id: Uuid,
) -> MembershipResult<EventMembership> {
    with_deadline(join_event_inner(db_pool, event_id, user_id)).await
}

async fn join_event_inner(
    db_pool: &SqlitePool,
    event_id: Uuid,
    user_id: Uuid,
) -> MembershipResult<EventMembership> {
    let Some((max_participants,)): Option<(Option<i64>,)> =
        sqlx::query_as("SELECT max_participants FROM events WHERE id=?")
            .bind(event_id.to_string())
            .fetch_optional(db_pool)
            .await?
    else {
        return Err(MembershipError::NotFound(Entity::Event));
    };

    if sqlx::query("SELECT 1 FROM event_members WHERE event_id=? AND user_id=?")
        .bind(event_id.to_string())
        .bind(user_id.to_string())
        .fetch_optional(db_pool)
        .await?
        .is_some()
    {
        return Err(MembershipError::AlreadyMember);
    }

    let joined_at = now_ts();

    // The capacity guard and the insert are one statement; two racing joins
    // cannot both pass the count. A racing duplicate of the same pair trips
    // the primary key instead.
    let result = match max_participants {
        Some(cap) => {
            sqlx::query(
                "INSERT INTO event_members (event_id,user_id,joined_at) \
                 SELECT ?1,?2,?3 \
                 WHERE (SELECT COUNT(*) FROM event_members WHERE event_id=?1) < ?4",
            )
            .bind(event_id.to_string())
            .bind(user_id.to_string())
            .bind(joined_at)
            .bind(cap)
            .execute(db_pool)
            .await
        }
        None => {
            sqlx::query("INSERT INTO event_members (event_id,user_id,joined_at) VALUES (?,?,?)")
                .bind(event_id.to_string())
                .bind(user_id.to_string())
                .bind(joined_at)
                .execute(db_pool)
                .await
        }
    };

    match result {
        Ok(done) if done.rows_affected() == 0 => Err(MembershipError::CapacityExceeded),
        Ok(_) => {
            tracing::debug!(%event_id, %user_id, "event joined");
            Ok(EventMembership { event_id, user_id, joined_at })
        }
        Err(e) if is_unique_violation(&e) => Err(MembershipError::AlreadyMember),
        Err(e) => Err(e.into()),
    }
}

/// Idempotent: leaving an event the caller never joined is a no-op.
pub async fn leave_event(
    db_pool: &SqlitePool,
    event_id: Uuid,
    user_id: Uuid,
) -> MembershipResult<()> {
    with_deadline(async {
        if sqlx::query("SELECT 1 FROM events WHERE id=?")
            .bind(event_id.to_string())
            .fetch_optional(db_pool)
            .await?
            .is_none()
        {
            return Err(MembershipError::NotFound(Entity::Event));
        }

        sqlx::query("DELETE FROM event_members WHERE event_id=? AND user_id=?")
            .bind(event_id.to_string())
            .bind(user_id.to_string())
            .execute(db_pool)
            .await?;

        Ok(())
    })
    .await
}

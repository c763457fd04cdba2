//! Conversation history storage.
//!
//! Turns are ordered by `created_at`, with the row id breaking ties between
//! turns written within the same second.

use chrono::{DateTime, Utc};
use sqlx::SqliteExecutor;

use crate::error::Result;
use crate::models::{Message, MessageRole};

/// Append a turn and return its id.
pub async fn append_message<'e, E>(
    executor: E,
    user_id: i64,
    role: MessageRole,
    content: &str,
    now: DateTime<Utc>,
) -> Result<i64>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        INSERT INTO messages (user_id, role, content, created_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(role)
    .bind(content)
    .bind(now.timestamp())
    .execute(executor)
    .await?;

    Ok(result.last_insert_rowid())
}

/// The newest `limit` turns, returned oldest first.
pub async fn recent_messages<'e, E>(executor: E, user_id: i64, limit: usize) -> Result<Vec<Message>>
where
    E: SqliteExecutor<'e>,
{
    let messages = sqlx::query_as::<_, Message>(
        r#"
        SELECT id, user_id, role, content, created_at
        FROM (
            SELECT id, user_id, role, content, created_at
            FROM messages
            WHERE user_id = ?
            ORDER BY created_at DESC, id DESC
            LIMIT ?
        )
        ORDER BY created_at ASC, id ASC
        "#,
    )
    .bind(user_id)
    .bind(limit as i64)
    .fetch_all(executor)
    .await?;

    Ok(messages)
}

/// Every stored turn of a user, oldest first.
pub async fn all_messages<'e, E>(executor: E, user_id: i64) -> Result<Vec<Message>>
where
    E: SqliteExecutor<'e>,
{
    let messages = sqlx::query_as::<_, Message>(
        r#"
        SELECT id, user_id, role, content, created_at
        FROM messages
        WHERE user_id = ?
        ORDER BY created_at ASC, id ASC
        "#,
    )
    .bind(user_id)
    .fetch_all(executor)
    .await?;

    Ok(messages)
}

/// Number of stored turns for a user.
pub async fn count_messages<'e, E>(executor: E, user_id: i64) -> Result<i64>
where
    E: SqliteExecutor<'e>,
{
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM messages
        WHERE user_id = ?
        "#,
    )
    .bind(user_id)
    .fetch_one(executor)
    .await?;

    Ok(count)
}

/// Turns older than the newest `keep`, oldest first.
pub async fn overflow_messages<'e, E>(executor: E, user_id: i64, keep: usize) -> Result<Vec<Message>>
where
    E: SqliteExecutor<'e>,
{
    let messages = sqlx::query_as::<_, Message>(
        r#"
        SELECT id, user_id, role, content, created_at
        FROM messages
        WHERE user_id = ?1
          AND id NOT IN (
              SELECT id
              FROM messages
              WHERE user_id = ?1
              ORDER BY created_at DESC, id DESC
              LIMIT ?2
          )
        ORDER BY created_at ASC, id ASC
        "#,
    )
    .bind(user_id)
    .bind(keep as i64)
    .fetch_all(executor)
    .await?;

    Ok(messages)
}

/// Delete everything but the newest `keep` turns. Returns the number deleted.
pub async fn trim_messages<'e, E>(executor: E, user_id: i64, keep: usize) -> Result<u64>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        DELETE FROM messages
        WHERE user_id = ?1
          AND id NOT IN (
              SELECT id
              FROM messages
              WHERE user_id = ?1
              ORDER BY created_at DESC, id DESC
              LIMIT ?2
          )
        "#,
    )
    .bind(user_id)
    .bind(keep as i64)
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

/// Delete a user's turns with ids up to and including `last_id`.
/// Returns the number deleted.
pub async fn delete_through<'e, E>(executor: E, user_id: i64, last_id: i64) -> Result<u64>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        DELETE FROM messages
        WHERE user_id = ? AND id <= ?
        "#,
    )
    .bind(user_id)
    .bind(last_id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

/// Delete the whole history of a user. Returns the number deleted.
pub async fn clear_messages<'e, E>(executor: E, user_id: i64) -> Result<u64>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        DELETE FROM messages
        WHERE user_id = ?
        "#,
    )
    .bind(user_id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{user, Database};
    use chrono::{Duration, TimeZone};

    async fn seeded(count: usize) -> (Database, DateTime<Utc>) {
        let db = Database::connect_in_memory().await.unwrap();
        let base = Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap();
        user::ensure_user(db.pool(), 1, base).await.unwrap();
        for i in 0..count {
            let role = if i % 2 == 0 {
                MessageRole::User
            } else {
                MessageRole::Assistant
            };
            // Pairs share a timestamp to exercise id tie-breaking.
            let at = base + Duration::seconds((i / 2) as i64);
            append_message(db.pool(), 1, role, &format!("m{i}"), at)
                .await
                .unwrap();
        }
        (db, base)
    }

    fn contents(messages: &[Message]) -> Vec<String> {
        messages.iter().map(|m| m.content.clone()).collect()
    }

    #[tokio::test]
    async fn recent_is_oldest_first_window() {
        let (db, _) = seeded(6).await;
        let recent = recent_messages(db.pool(), 1, 3).await.unwrap();
        assert_eq!(contents(&recent), vec!["m3", "m4", "m5"]);
        assert_eq!(recent[0].role, MessageRole::Assistant);
    }

    #[tokio::test]
    async fn overflow_is_everything_outside_window() {
        let (db, _) = seeded(7).await;
        let overflow = overflow_messages(db.pool(), 1, 4).await.unwrap();
        assert_eq!(contents(&overflow), vec!["m0", "m1", "m2"]);

        let none = overflow_messages(db.pool(), 1, 10).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn trim_keeps_newest() {
        let (db, _) = seeded(8).await;
        assert_eq!(trim_messages(db.pool(), 1, 5).await.unwrap(), 3);
        assert_eq!(count_messages(db.pool(), 1).await.unwrap(), 5);
        let all = all_messages(db.pool(), 1).await.unwrap();
        assert_eq!(contents(&all), vec!["m3", "m4", "m5", "m6", "m7"]);
        assert_eq!(trim_messages(db.pool(), 1, 5).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn delete_through_spares_later_turns() {
        let (db, base) = seeded(6).await;
        let all = all_messages(db.pool(), 1).await.unwrap();
        user::ensure_user(db.pool(), 2, base).await.unwrap();
        append_message(db.pool(), 2, MessageRole::User, "other", base)
            .await
            .unwrap();

        assert_eq!(delete_through(db.pool(), 1, all[2].id).await.unwrap(), 3);
        let left = all_messages(db.pool(), 1).await.unwrap();
        assert_eq!(contents(&left), vec!["m3", "m4", "m5"]);
        assert_eq!(count_messages(db.pool(), 2).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn clear_removes_only_that_user() {
        let (db, base) = seeded(4).await;
        user::ensure_user(db.pool(), 2, base).await.unwrap();
        append_message(db.pool(), 2, MessageRole::User, "other", base)
            .await
            .unwrap();

        assert_eq!(clear_messages(db.pool(), 1).await.unwrap(), 4);
        assert_eq!(count_messages(db.pool(), 1).await.unwrap(), 0);
        assert_eq!(count_messages(db.pool(), 2).await.unwrap(), 1);
    }
}

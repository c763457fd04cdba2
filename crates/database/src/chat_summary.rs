//! Long-term memory persistence, one row per user.

use chrono::{DateTime, Utc};
use sqlx::SqliteExecutor;

use crate::models::ChatSummary;
use crate::Result;

/// Replace the summary text of a user and add `summarized` to the running count.
pub async fn upsert_summary<'e, E>(
    executor: E,
    user_id: i64,
    summary: &str,
    summarized: i64,
    now: DateTime<Utc>,
) -> Result<()>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO chat_summaries (user_id, summary, messages_summarized, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?4)
        ON CONFLICT(user_id) DO UPDATE SET
            summary = excluded.summary,
            messages_summarized = chat_summaries.messages_summarized + excluded.messages_summarized,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(user_id)
    .bind(summary)
    .bind(summarized)
    .bind(now.timestamp())
    .execute(executor)
    .await?;

    Ok(())
}

/// Get the summary of a user, if one was ever written.
pub async fn get_summary<'e, E>(executor: E, user_id: i64) -> Result<Option<ChatSummary>>
where
    E: SqliteExecutor<'e>,
{
    let record = sqlx::query_as::<_, ChatSummary>(
        r#"
        SELECT user_id, summary, messages_summarized, created_at, updated_at
        FROM chat_summaries
        WHERE user_id = ?
        "#,
    )
    .bind(user_id)
    .fetch_optional(executor)
    .await?;

    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{user, Database};
    use chrono::{Duration, TimeZone};

    #[tokio::test]
    async fn upsert_keeps_a_single_row_and_accumulates() {
        let db = Database::connect_in_memory().await.unwrap();
        let t0 = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();
        user::ensure_user(db.pool(), 9, t0).await.unwrap();

        assert!(get_summary(db.pool(), 9).await.unwrap().is_none());

        upsert_summary(db.pool(), 9, "first", 12, t0).await.unwrap();
        let t1 = t0 + Duration::days(1);
        upsert_summary(db.pool(), 9, "second", 10, t1).await.unwrap();

        let summary = get_summary(db.pool(), 9).await.unwrap().unwrap();
        assert_eq!(summary.summary, "second");
        assert_eq!(summary.messages_summarized, 22);
        assert_eq!(summary.created_at, t0);
        assert_eq!(summary.updated_at, t1);

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chat_summaries")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }
}

//! User registry operations.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqliteExecutor;

use crate::error::{DatabaseError, Result};
use crate::models::User;

/// Profile fields reported by the messaging platform on each interaction.
#[derive(Debug, Clone, Default)]
pub struct UserProfile {
    pub user_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    /// Only used when the user is created; later changes go through [`set_language`].
    pub language_code: Option<String>,
}

/// Default interface language for new users.
pub const DEFAULT_LANGUAGE: &str = "ru";

/// Create the user on first contact, otherwise refresh profile and `last_interaction`.
pub async fn upsert_user<'e, E>(executor: E, profile: &UserProfile, now: DateTime<Utc>) -> Result<User>
where
    E: SqliteExecutor<'e>,
{
    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (user_id, username, first_name, language_code, created_at, last_interaction)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(user_id) DO UPDATE SET
            username = COALESCE(excluded.username, users.username),
            first_name = COALESCE(excluded.first_name, users.first_name),
            last_interaction = excluded.last_interaction
        RETURNING user_id, username, first_name, language_code, created_at, last_interaction,
                  free_messages_today, free_messages_reset_date
        "#,
    )
    .bind(profile.user_id)
    .bind(&profile.username)
    .bind(&profile.first_name)
    .bind(profile.language_code.as_deref().unwrap_or(DEFAULT_LANGUAGE))
    .bind(now.timestamp())
    .bind(now.timestamp())
    .fetch_one(executor)
    .await?;

    Ok(user)
}

/// Make sure a row exists for `user_id` without touching an existing one.
pub async fn ensure_user<'e, E>(executor: E, user_id: i64, now: DateTime<Utc>) -> Result<()>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO users (user_id, language_code, created_at, last_interaction)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(user_id) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(DEFAULT_LANGUAGE)
    .bind(now.timestamp())
    .bind(now.timestamp())
    .execute(executor)
    .await?;

    Ok(())
}

/// Get a user by id.
pub async fn get_user<'e, E>(executor: E, user_id: i64) -> Result<User>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query_as::<_, User>(
        r#"
        SELECT user_id, username, first_name, language_code, created_at, last_interaction,
               free_messages_today, free_messages_reset_date
        FROM users
        WHERE user_id = ?
        "#,
    )
    .bind(user_id)
    .fetch_optional(executor)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "User",
        id: user_id.to_string(),
    })
}

/// Update the interface language of a user.
pub async fn set_language<'e, E>(executor: E, user_id: i64, language_code: &str) -> Result<()>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        UPDATE users
        SET language_code = ?
        WHERE user_id = ?
        "#,
    )
    .bind(language_code)
    .bind(user_id)
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "User",
            id: user_id.to_string(),
        });
    }

    Ok(())
}

/// Atomically consume one free message for `today`.
///
/// A counter stamped with an earlier day restarts at one. Returns `false`
/// without writing anything when the daily `limit` is already reached.
pub async fn consume_free_message<'e, E>(
    executor: E,
    user_id: i64,
    today: NaiveDate,
    limit: i64,
) -> Result<bool>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        UPDATE users
        SET free_messages_today = CASE
                WHEN free_messages_reset_date IS NULL OR free_messages_reset_date < ?1 THEN 1
                ELSE free_messages_today + 1
            END,
            free_messages_reset_date = ?1
        WHERE user_id = ?2
          AND (
                free_messages_reset_date IS NULL
                OR free_messages_reset_date < ?1
                OR free_messages_today < ?3
          )
          AND ?3 > 0
        "#,
    )
    .bind(today)
    .bind(user_id)
    .bind(limit)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::models::PasswordReset;

pub async fn create(
    pool: &PgPool,
    email: &str,
    code: &str,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
) -> Result<PasswordReset, sqlx::Error> {
    sqlx::query_as::<_, PasswordReset>(
        "INSERT INTO password_resets (email, code, created_at, expires_at)
         VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(email)
    .bind(code)
    .bind(created_at)
    .bind(expires_at)
    .fetch_one(pool)
    .await
}

/// Newest code for the email, locked for the rest of the transaction.
///
/// No `is_used` filter: once the newest code is redeemed, older unused rows
/// must not become redeemable again.
pub async fn lock_latest<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    email: &str,
) -> Result<Option<PasswordReset>, sqlx::Error> {
    sqlx::query_as::<_, PasswordReset>(
        "SELECT * FROM password_resets
         WHERE email = $1
         ORDER BY created_at DESC, id DESC
         LIMIT 1
         FOR UPDATE",
    )
    .bind(email)
    .fetch_optional(executor)
    .await
}

/// Newest code for the email, whatever its state. No lock is taken.
pub async fn find_latest<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    email: &str,
) -> Result<Option<PasswordReset>, sqlx::Error> {
    sqlx::query_as::<_, PasswordReset>(
        "SELECT * FROM password_resets
         WHERE email = $1
         ORDER BY created_at DESC, id DESC
         LIMIT 1",
    )
    .bind(email)
    .fetch_optional(executor)
    .await
}

/// Newest unused, unexpired code for the email.
pub async fn find_latest_active(
    pool: &PgPool,
    email: &str,
) -> Result<Option<PasswordReset>, sqlx::Error> {
    sqlx::query_as::<_, PasswordReset>(
        "SELECT * FROM password_resets
         WHERE email = $1
           AND id = (
               SELECT id FROM password_resets
               WHERE email = $1
               ORDER BY created_at DESC, id DESC
               LIMIT 1
           )
           AND is_used = false
           AND expires_at >= now()",
    )
    .bind(email)
    .fetch_optional(pool)
    .await
}

pub async fn list_by_email(pool: &PgPool, email: &str) -> Result<Vec<PasswordReset>, sqlx::Error> {
    sqlx::query_as::<_, PasswordReset>(
        "SELECT * FROM password_resets
         WHERE email = $1
         ORDER BY created_at DESC, id DESC",
    )
    .bind(email)
    .fetch_all(pool)
    .await
}

pub async fn mark_used<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    id: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE password_resets SET is_used = true WHERE id = $1")
        .bind(id)
        .execute(executor)
        .await?;
    Ok(())
}

use sqlx::PgPool;
use uuid::Uuid;

use crate::identity::normalize_email;
use crate::models::Account;

/// Stores `email` as given; the identity key is derived from it here.
pub async fn create<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    email: &str,
    password_hash: &str,
    full_name: &str,
) -> Result<Account, sqlx::Error> {
    sqlx::query_as::<_, Account>(
        "INSERT INTO accounts (email, email_key, password_hash, full_name)
         VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(email)
    .bind(normalize_email(email))
    .bind(password_hash)
    .bind(full_name)
    .fetch_one(executor)
    .await
}

/// Look up by identity. Any spelling of the address works.
pub async fn find_by_email<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    email: &str,
) -> Result<Option<Account>, sqlx::Error> {
    sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE email_key = $1")
        .bind(normalize_email(email))
        .fetch_optional(executor)
        .await
}

/// Byte-for-byte match on the stored email. Diagnostics only.
pub async fn find_exact(pool: &PgPool, email: &str) -> Result<Vec<Account>, sqlx::Error> {
    sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE email = $1")
        .bind(email)
        .fetch_all(pool)
        .await
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Account>, sqlx::Error> {
    sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn update_password<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    id: Uuid,
    password_hash: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE accounts SET password_hash = $2 WHERE id = $1")
        .bind(id)
        .bind(password_hash)
        .execute(executor)
        .await?;
    Ok(())
}

pub async fn set_active(pool: &PgPool, id: Uuid, is_active: bool) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE accounts SET is_active = $2 WHERE id = $1")
        .bind(id)
        .bind(is_active)
        .execute(pool)
        .await?;
    Ok(())
}

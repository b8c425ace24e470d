use sqlx::PgPool;
use uuid::Uuid;

use crate::models::AuditEvent;

pub async fn log_event(
    pool: &PgPool,
    account_id: Option<Uuid>,
    action: &str,
    details: Option<serde_json::Value>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO audit_events (account_id, action, details)
         VALUES ($1, $2, $3)",
    )
    .bind(account_id)
    .bind(action)
    .bind(details)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn list_for_account(
    pool: &PgPool,
    account_id: Uuid,
    limit: i64,
) -> Result<Vec<AuditEvent>, sqlx::Error> {
    sqlx::query_as::<_, AuditEvent>(
        "SELECT * FROM audit_events WHERE account_id = $1
         ORDER BY created_at DESC, id DESC LIMIT $2",
    )
    .bind(account_id)
    .bind(limit)
    .fetch_all(pool)
    .await
}

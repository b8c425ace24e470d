use sqlx::PgPool;
use uuid::Uuid;

/// Record an audit event. Failures are logged, never surfaced to the caller.
pub async fn log_event(
    pool: &PgPool,
    account_id: Option<Uuid>,
    action: &str,
    details: Option<serde_json::Value>,
) {
    if let Err(e) = crate::db::audit::log_event(pool, account_id, action, details).await {
        tracing::error!("Failed to log audit event {action}: {e}");
    }
}

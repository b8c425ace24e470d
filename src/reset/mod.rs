//! Password reset: issuing codes and redeeming them.

pub mod code;
pub mod diagnostics;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::auth::password;
use crate::db;
use crate::identity::{parse_email, validate_password};
use crate::middleware::audit;
use crate::models::PasswordReset;
use crate::state::{AppState, SharedState};

#[derive(Debug)]
pub enum ResetError {
    AccountNotFound,
    CodeNotFound,
    CodeExpired,
    Validation(String),
    /// Retry-after seconds.
    Throttled(u64),
    Hashing(String),
    StoreUnavailable(sqlx::Error),
}

impl std::fmt::Display for ResetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResetError::AccountNotFound => write!(f, "no active account for email"),
            ResetError::CodeNotFound => write!(f, "no redeemable reset code matches"),
            ResetError::CodeExpired => write!(f, "reset code expired"),
            ResetError::Validation(msg) => write!(f, "validation failed: {msg}"),
            ResetError::Throttled(secs) => write!(f, "throttled, retry after {secs}s"),
            ResetError::Hashing(msg) => write!(f, "password hashing failed: {msg}"),
            ResetError::StoreUnavailable(err) => write!(f, "store unavailable: {err}"),
        }
    }
}

impl std::error::Error for ResetError {}

impl From<sqlx::Error> for ResetError {
    fn from(err: sqlx::Error) -> Self {
        ResetError::StoreUnavailable(err)
    }
}

/// Accept a reset request for `email` and issue the code in the background.
///
/// Only validation and throttling run before this returns, so a caller that
/// answers right away takes the same time for known and unknown addresses.
/// The handle resolves to the outcome of [`issue`] and may be dropped.
pub fn request_reset(
    state: &SharedState,
    email: &str,
) -> Result<JoinHandle<Result<PasswordReset, ResetError>>, ResetError> {
    let email = parse_email(email).map_err(ResetError::Validation)?;

    state
        .reset_request_limiter
        .hit(&email)
        .map_err(ResetError::Throttled)?;

    let state = Arc::clone(state);
    Ok(tokio::spawn(async move {
        let outcome = issue(&state, &email).await;
        match &outcome {
            Ok(_) => {}
            Err(ResetError::AccountNotFound) => {
                tracing::debug!("Reset requested for unknown or inactive account");
            }
            Err(e) => tracing::error!("Failed to issue password reset code: {e}"),
        }
        outcome
    }))
}

/// Issue a new reset code for a normalized `email` and deliver it.
///
/// Earlier codes for the same email stay in the store but are superseded.
pub async fn issue(state: &AppState, email: &str) -> Result<PasswordReset, ResetError> {
    let account = db::accounts::find_by_email(&state.pool, email)
        .await?
        .filter(|a| a.is_active)
        .ok_or(ResetError::AccountNotFound)?;

    let reset_config = &state.config.reset;
    let code = code::generate(reset_config.code_length);
    let now = Utc::now();
    let issued = db::password_resets::create(
        &state.pool,
        email,
        &code,
        now,
        now + reset_config.code_ttl,
    )
    .await?;

    tracing::info!(
        reset_id = issued.id,
        account_id = %account.id,
        "Password reset code issued"
    );

    let ttl_minutes = reset_config.code_ttl.num_minutes();
    if let Err(e) = state.notifier.send_reset_code(email, &code, ttl_minutes).await {
        tracing::error!("Failed to deliver password reset code: {e}");
    }

    audit::log_event(
        &state.pool,
        Some(account.id),
        "password_reset.requested",
        Some(serde_json::json!({ "reset_id": issued.id })),
    )
    .await;

    Ok(issued)
}

/// Redeem `code` for `email`, replacing the account password.
///
/// Only the newest code for the email is redeemable. The lookup, the password
/// update and the code invalidation share one transaction.
pub async fn confirm_reset(
    state: &AppState,
    email: &str,
    submitted_code: &str,
    new_password: &str,
) -> Result<Uuid, ResetError> {
    let email = parse_email(email).map_err(ResetError::Validation)?;
    validate_password(new_password).map_err(ResetError::Validation)?;

    state
        .reset_confirm_limiter
        .check(&email)
        .map_err(ResetError::Throttled)?;

    match attempt(state, &email, submitted_code, new_password).await {
        Ok(account_id) => {
            state.reset_confirm_limiter.clear(&email);
            tracing::info!(account_id = %account_id, "Password reset completed");
            audit::log_event(
                &state.pool,
                Some(account_id),
                "password_reset.completed",
                None,
            )
            .await;
            Ok(account_id)
        }
        Err(e @ (ResetError::CodeNotFound | ResetError::CodeExpired | ResetError::AccountNotFound)) => {
            state.reset_confirm_limiter.record(&email);
            tracing::info!("Password reset rejected: {e}");
            Err(e)
        }
        Err(e) => Err(e),
    }
}

async fn attempt(
    state: &AppState,
    email: &str,
    submitted_code: &str,
    new_password: &str,
) -> Result<Uuid, ResetError> {
    // Wrong guesses stop here, before any password hashing.
    let newest = db::password_resets::find_latest(&state.pool, email).await?;
    redeemable(newest, submitted_code, Utc::now())?;

    let pw_hash = password::hash(new_password).map_err(ResetError::Hashing)?;
    redeem(state, email, submitted_code, &pw_hash).await
}

/// Check the newest code row for an email against a submitted code.
fn redeemable(
    newest: Option<PasswordReset>,
    submitted_code: &str,
    now: DateTime<Utc>,
) -> Result<PasswordReset, ResetError> {
    let row = newest
        .filter(|r| !r.is_used && code::matches(&r.code, submitted_code))
        .ok_or(ResetError::CodeNotFound)?;

    if row.is_expired_at(now) {
        return Err(ResetError::CodeExpired);
    }
    Ok(row)
}

async fn redeem(
    state: &AppState,
    email: &str,
    submitted_code: &str,
    pw_hash: &str,
) -> Result<Uuid, ResetError> {
    let mut tx = state.pool.begin().await?;

    // Re-checked under the row lock: a concurrent redemption may have won.
    let newest = db::password_resets::lock_latest(&mut *tx, email).await?;
    let latest = redeemable(newest, submitted_code, Utc::now())?;

    let account = db::accounts::find_by_email(&mut *tx, email)
        .await?
        .filter(|a| a.is_active)
        .ok_or(ResetError::AccountNotFound)?;

    db::accounts::update_password(&mut *tx, account.id, pw_hash).await?;
    db::password_resets::mark_used(&mut *tx, latest.id).await?;

    tx.commit().await?;

    Ok(account.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn newest(is_used: bool, expires_in: Duration) -> Option<PasswordReset> {
        let now = Utc::now();
        Some(PasswordReset {
            id: 7,
            email: "admin@dixai.net".to_string(),
            code: "460426".to_string(),
            is_used,
            expires_at: now + expires_in,
            created_at: now - Duration::minutes(1),
        })
    }

    #[test]
    fn matching_unused_code_is_redeemable() {
        let row = redeemable(newest(false, Duration::minutes(10)), "460426", Utc::now()).unwrap();
        assert_eq!(row.id, 7);
    }

    #[test]
    fn missing_wrong_or_used_code_is_not_found() {
        let now = Utc::now();
        assert!(matches!(redeemable(None, "460426", now), Err(ResetError::CodeNotFound)));
        assert!(matches!(
            redeemable(newest(false, Duration::minutes(10)), "000000", now),
            Err(ResetError::CodeNotFound)
        ));
        assert!(matches!(
            redeemable(newest(true, Duration::minutes(10)), "460426", now),
            Err(ResetError::CodeNotFound)
        ));
    }

    #[test]
    fn expired_code_reports_expiry_only_when_it_matches() {
        let now = Utc::now();
        assert!(matches!(
            redeemable(newest(false, Duration::minutes(-1)), "460426", now),
            Err(ResetError::CodeExpired)
        ));
        assert!(matches!(
            redeemable(newest(false, Duration::minutes(-1)), "000000", now),
            Err(ResetError::CodeNotFound)
        ));
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One issued reset code. Rows are never deleted; a newer row for the same
/// email supersedes this one.
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct PasswordReset {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub code: String,
    pub is_used: bool,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Lifecycle of a reset code as observed at `now`.
///
/// `Issued` moves to `Redeemed` on a successful confirmation or to `Expired`
/// once `now` passes `expires_at`; neither goes back. `Superseded` marks an
/// unused code that is no longer the newest for its email.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetCodeState {
    Issued,
    Redeemed,
    Expired,
    Superseded,
}

impl PasswordReset {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn state_at(&self, now: DateTime<Utc>, is_newest: bool) -> ResetCodeState {
        if self.is_used {
            ResetCodeState::Redeemed
        } else if self.is_expired_at(now) {
            ResetCodeState::Expired
        } else if !is_newest {
            ResetCodeState::Superseded
        } else {
            ResetCodeState::Issued
        }
    }
}

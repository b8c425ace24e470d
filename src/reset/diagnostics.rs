//! Read-only reconciliation view over the account and reset code stores.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db;
use crate::identity::normalize_email;
use crate::models::{Account, PasswordReset, ResetCodeState};

#[derive(Debug, Serialize)]
pub struct AccountSummary {
    pub id: Uuid,
    pub email: String,
    pub is_active: bool,
}

#[derive(Debug, Serialize)]
pub struct ResetCodeView {
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub is_used: bool,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub state: ResetCodeState,
}

#[derive(Debug, Serialize)]
pub struct DiagnosticReport {
    pub queried: String,
    pub normalized: String,
    /// Accounts whose stored email equals the query byte for byte.
    pub exact_matches: Vec<AccountSummary>,
    /// The account that owns the normalized identity, if any.
    pub identity_match: Option<AccountSummary>,
    /// Newest first.
    pub reset_codes: Vec<ResetCodeView>,
}

impl DiagnosticReport {
    /// The account exists but only under a differently cased or padded email.
    pub fn has_case_mismatch(&self) -> bool {
        self.exact_matches.is_empty() && self.identity_match.is_some()
    }

    pub fn active_code(&self) -> Option<&ResetCodeView> {
        self.reset_codes
            .first()
            .filter(|c| c.state == ResetCodeState::Issued)
    }
}

impl From<&Account> for AccountSummary {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            email: account.email.clone(),
            is_active: account.is_active,
        }
    }
}

/// Build the report for `email`. Codes are included only when `reveal_codes`.
pub async fn inspect(
    pool: &PgPool,
    email: &str,
    reveal_codes: bool,
) -> Result<DiagnosticReport, sqlx::Error> {
    let normalized = normalize_email(email);

    let exact = db::accounts::find_exact(pool, email).await?;
    let identity = db::accounts::find_by_email(pool, &normalized).await?;
    let resets = db::password_resets::list_by_email(pool, &normalized).await?;

    let now = Utc::now();
    let reset_codes = resets
        .iter()
        .enumerate()
        .map(|(i, r)| view(r, now, i == 0, reveal_codes))
        .collect();

    Ok(DiagnosticReport {
        queried: email.to_string(),
        normalized,
        exact_matches: exact.iter().map(AccountSummary::from).collect(),
        identity_match: identity.as_ref().map(AccountSummary::from),
        reset_codes,
    })
}

fn view(row: &PasswordReset, now: DateTime<Utc>, is_newest: bool, reveal: bool) -> ResetCodeView {
    ResetCodeView {
        id: row.id,
        code: reveal.then(|| row.code.clone()),
        is_used: row.is_used,
        expires_at: row.expires_at,
        created_at: row.created_at,
        state: row.state_at(now, is_newest),
    }
}

//! End-to-end exercise of a running reset service, used by `recovery-probe`.
//!
//! The reset code is read straight from the store, so reads retry with
//! bounded exponential backoff until the issued row is visible.

use std::future::Future;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use sqlx::PgPool;

use crate::db;
use crate::identity::normalize_email;

#[derive(Debug, Clone)]
pub struct Backoff {
    pub attempts: u32,
    pub initial: Duration,
    pub max_delay: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            attempts: 5,
            initial: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl Backoff {
    /// Delay slept after the given failed attempt (0-based): doubling, capped.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.initial.saturating_mul(factor).min(self.max_delay)
    }
}

/// Call `f` until it yields `Some`, sleeping between attempts.
///
/// Errors count as failed attempts. The last error is returned if every
/// attempt failed with one; `Ok(None)` if the value never appeared.
pub async fn poll<T, E, F, Fut>(backoff: &Backoff, mut f: F) -> Result<Option<T>, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
{
    let mut last = Ok(None);
    for attempt in 0..backoff.attempts {
        match f().await {
            Ok(Some(value)) => return Ok(Some(value)),
            other => last = other,
        }
        if attempt + 1 < backoff.attempts {
            tokio::time::sleep(backoff.delay_after(attempt)).await;
        }
    }
    last
}

/// Thin JSON client for the reset endpoints.
pub struct ResetClient {
    base_url: String,
    http: Client,
}

#[derive(Debug)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl ResetClient {
    pub fn new(base_url: &str) -> Result<Self, String> {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {e}"))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub async fn forgot_password(&self, email: &str) -> Result<ApiResponse, String> {
        self.post("/auth/forgot-password", json!({ "email": email }))
            .await
    }

    pub async fn reset_password(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
    ) -> Result<ApiResponse, String> {
        self.post(
            "/auth/reset-password",
            json!({ "email": email, "code": code, "new_password": new_password }),
        )
        .await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<ApiResponse, String> {
        self.post("/auth/login", json!({ "email": email, "password": password }))
            .await
    }

    async fn post(&self, path: &str, body: Value) -> Result<ApiResponse, String> {
        let resp = self
            .http
            .post(format!("{}{path}", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("POST {path} failed: {e}"))?;
        let status = resp.status();
        let body = resp.json().await.unwrap_or(Value::Null);
        Ok(ApiResponse { status, body })
    }
}

#[derive(Debug)]
pub enum FlowOutcome {
    /// Reset redeemed and the new password logs in.
    Succeeded,
    RequestRejected(ApiResponse),
    CodeNeverVisible,
    ConfirmRejected(ApiResponse),
    LoginRejected(ApiResponse),
}

/// Request a code, read it back from the store, redeem it, then log in.
pub async fn run_flow(
    pool: &PgPool,
    client: &ResetClient,
    email: &str,
    new_password: &str,
    backoff: &Backoff,
) -> Result<FlowOutcome, String> {
    let normalized = normalize_email(email);

    let baseline = db::password_resets::list_by_email(pool, &normalized)
        .await
        .map_err(|e| format!("Failed to read reset codes: {e}"))?
        .first()
        .map(|r| r.id)
        .unwrap_or(0);

    let resp = client.forgot_password(email).await?;
    tracing::info!(status = %resp.status, "forgot-password answered");
    if resp.status != StatusCode::OK {
        return Ok(FlowOutcome::RequestRejected(resp));
    }

    let email_key = normalized.as_str();
    let issued = poll(backoff, move || async move {
        db::password_resets::find_latest_active(pool, email_key)
            .await
            .map(|r| r.filter(|r| r.id > baseline))
    })
    .await
    .map_err(|e| format!("Failed to read reset codes: {e}"))?;

    let Some(issued) = issued else {
        return Ok(FlowOutcome::CodeNeverVisible);
    };
    tracing::info!(reset_id = issued.id, "Reset code visible in store");

    let resp = client
        .reset_password(email, &issued.code, new_password)
        .await?;
    tracing::info!(status = %resp.status, "reset-password answered");
    if resp.status != StatusCode::OK {
        return Ok(FlowOutcome::ConfirmRejected(resp));
    }

    let resp = client.login(email, new_password).await?;
    if resp.status != StatusCode::OK {
        return Ok(FlowOutcome::LoginRejected(resp));
    }

    Ok(FlowOutcome::Succeeded)
}

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use crate::auth::extractor::AuthUser;
use crate::error::AppError;
use crate::identity::normalize_email;
use crate::reset::{self, diagnostics, ResetError};
use crate::routes::auth::MessageResponse;
use crate::routes::JsonBody;
use crate::state::SharedState;

/// Same answer for every accepted request so callers cannot probe for accounts.
pub const RESET_REQUESTED: &str = "If that email is registered, a reset code has been sent.";

#[derive(Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub code: String,
    pub new_password: String,
}

#[derive(Deserialize)]
pub struct DiagnosticsQuery {
    pub email: String,
}

pub async fn forgot_password(
    State(state): State<SharedState>,
    JsonBody(req): JsonBody<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    // Issuance finishes in the background; dropping the handle detaches it.
    match reset::request_reset(&state, &req.email) {
        Ok(_issuing) => {}
        Err(ResetError::Throttled(secs)) => {
            tracing::warn!("Reset request throttled ({secs}s remaining)");
        }
        Err(e) => return Err(e.into()),
    }

    Ok(Json(MessageResponse {
        message: RESET_REQUESTED.to_string(),
    }))
}

pub async fn reset_password(
    State(state): State<SharedState>,
    JsonBody(req): JsonBody<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    reset::confirm_reset(&state, &req.email, &req.code, &req.new_password).await?;

    Ok(Json(MessageResponse {
        message: "Password reset successfully".to_string(),
    }))
}

/// Reconciliation view for the caller's own email. Codes are never included.
pub async fn reset_diagnostics(
    State(state): State<SharedState>,
    auth: AuthUser,
    Query(query): Query<DiagnosticsQuery>,
) -> Result<Json<diagnostics::DiagnosticReport>, AppError> {
    if normalize_email(&query.email) != auth.email {
        return Err(AppError::Forbidden(
            "Diagnostics are limited to your own account".to_string(),
        ));
    }

    let report = diagnostics::inspect(&state.pool, &query.email, false).await?;
    Ok(Json(report))
}

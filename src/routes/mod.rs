pub mod auth;
pub mod reset;

use axum::extract::FromRequest;
use axum::routing::{get, post};
use axum::Router;

use crate::error::AppError;
use crate::state::SharedState;

/// JSON request body whose rejections render as `{ "detail": .. }`.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);

pub fn auth_routes() -> Router<SharedState> {
    Router::new()
        // Accounts
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        // Password reset
        .route("/auth/forgot-password", post(reset::forgot_password))
        .route("/auth/reset-password", post(reset::reset_password))
        .route("/auth/reset-diagnostics", get(reset::reset_diagnostics))
}

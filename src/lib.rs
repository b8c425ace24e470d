pub mod auth;
pub mod config;
pub mod db;
pub mod email;
pub mod error;
pub mod identity;
pub mod middleware;
pub mod models;
pub mod probe;
pub mod rate_limit;
pub mod reset;
pub mod routes;
pub mod state;

use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderName, HeaderValue};
use axum::Router;
use sqlx::PgPool;
use tokio::sync::watch;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::email::{LogNotifier, ResetNotifier, SystemMailer};
use crate::rate_limit::AttemptLimiter;
use crate::state::{AppState, SharedState};

/// Login failures allowed per email per window.
const LOGIN_MAX_FAILURES: u32 = 5;

pub fn build_app(pool: PgPool, config: Config) -> (Router, SharedState) {
    let notifier: Arc<dyn ResetNotifier> = match config.smtp.as_ref() {
        Some(smtp) => match SystemMailer::new(smtp) {
            Ok(mailer) => {
                tracing::info!("System SMTP configured");
                Arc::new(mailer)
            }
            Err(e) => {
                tracing::warn!("System SMTP not available: {e}");
                Arc::new(LogNotifier)
            }
        },
        None => Arc::new(LogNotifier),
    };

    let reset = &config.reset;
    let state: SharedState = Arc::new(AppState {
        login_limiter: AttemptLimiter::new(LOGIN_MAX_FAILURES, reset.throttle_window),
        reset_request_limiter: AttemptLimiter::new(reset.max_requests, reset.throttle_window),
        reset_confirm_limiter: AttemptLimiter::new(
            reset.max_failed_confirms,
            reset.throttle_window,
        ),
        pool,
        notifier,
        config,
    });

    let app = Router::new()
        .merge(routes::auth_routes())
        .route("/health", axum::routing::get(health))
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(TraceLayer::new_for_http())
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-content-type-options"),
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-frame-options"),
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("cache-control"),
            HeaderValue::from_static("no-store"),
        ))
        .with_state(state.clone());

    (app, state)
}

/// Periodically drop limiter entries whose window has passed, until shutdown.
pub async fn sweep_limiters(state: SharedState, mut shutdown: watch::Receiver<bool>) {
    let max_age = state.config.reset.throttle_window;
    let mut interval = tokio::time::interval(Duration::from_secs(60));

    loop {
        tokio::select! {
            _ = interval.tick() => {
                for limiter in state.limiters() {
                    limiter.cleanup(max_age);
                }
            }
            _ = shutdown.changed() => break,
        }
    }

    tracing::debug!("Limiter sweeper stopped");
}

async fn health() -> &'static str {
    "ok"
}

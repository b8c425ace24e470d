use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::email::ResetNotifier;
use crate::rate_limit::AttemptLimiter;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub notifier: Arc<dyn ResetNotifier>,
    pub login_limiter: AttemptLimiter,
    pub reset_request_limiter: AttemptLimiter,
    pub reset_confirm_limiter: AttemptLimiter,
}

impl AppState {
    pub fn limiters(&self) -> [&AttemptLimiter; 3] {
        [
            &self.login_limiter,
            &self.reset_request_limiter,
            &self.reset_confirm_limiter,
        ]
    }
}

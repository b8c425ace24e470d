use axum::extract::State;
use axum::Json;
use axum_extra::extract::cookie::{Cookie, SameSite};
use axum_extra::extract::CookieJar;
use serde::{Deserialize, Serialize};

use crate::auth::extractor::{AuthUser, ACCESS_COOKIE};
use crate::auth::jwt::{encode_token, Claims, ACCESS_TOKEN_MINUTES};
use crate::auth::password;
use crate::db;
use crate::error::AppError;
use crate::identity::{normalize_email, parse_email, validate_password};
use crate::middleware::audit;
use crate::models::Account;
use crate::routes::JsonBody;
use crate::state::SharedState;

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub full_name: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub account: Account,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

fn access_cookie(access_token: &str) -> CookieJar {
    let access = Cookie::build((ACCESS_COOKIE, access_token.to_string()))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::minutes(ACCESS_TOKEN_MINUTES))
        .build();

    CookieJar::new().add(access)
}

fn issue(state: &SharedState, account: Account) -> Result<(CookieJar, Json<AuthResponse>), AppError> {
    let claims = Claims::new(account.id, &normalize_email(&account.email));
    let access_token =
        encode_token(&claims, &state.config.jwt_secret).map_err(AppError::Internal)?;

    let jar = access_cookie(&access_token);
    Ok((
        jar,
        Json(AuthResponse {
            access_token,
            token_type: "bearer",
            account,
        }),
    ))
}

pub async fn register(
    State(state): State<SharedState>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> Result<(CookieJar, Json<AuthResponse>), AppError> {
    let email = parse_email(&req.email).map_err(AppError::BadRequest)?;
    validate_password(&req.password).map_err(AppError::BadRequest)?;

    let pw_hash = password::hash(&req.password).map_err(AppError::Internal)?;

    let account = db::accounts::create(&state.pool, &email, &pw_hash, req.full_name.trim())
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict("An account with that email already exists".to_string())
            }
            other => AppError::Database(other),
        })?;

    tracing::info!(account_id = %account.id, "Account registered");
    audit::log_event(&state.pool, Some(account.id), "account.registered", None).await;

    issue(&state, account)
}

pub async fn login(
    State(state): State<SharedState>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<(CookieJar, Json<AuthResponse>), AppError> {
    let email = parse_email(&req.email)
        .map_err(|_| AppError::Unauthorized("Invalid credentials".to_string()))?;

    if let Err(secs) = state.login_limiter.check(&email) {
        return Err(AppError::RateLimited(
            "Too many login attempts. Please try again later.".to_string(),
            secs,
        ));
    }

    let account = db::accounts::find_by_email(&state.pool, &email).await?;

    let valid = match &account {
        Some(account) => {
            password::verify(&req.password, &account.password_hash).map_err(AppError::Internal)?
        }
        None => password::verify_dummy(&req.password),
    };

    let account = match account {
        Some(account) if valid && account.is_active => account,
        _ => {
            state.login_limiter.record(&email);
            return Err(AppError::Unauthorized("Invalid credentials".to_string()));
        }
    };

    state.login_limiter.clear(&email);
    audit::log_event(&state.pool, Some(account.id), "account.login", None).await;

    issue(&state, account)
}

pub async fn logout() -> (CookieJar, Json<MessageResponse>) {
    let cleared = Cookie::build((ACCESS_COOKIE, ""))
        .path("/")
        .max_age(time::Duration::ZERO)
        .build();

    (
        CookieJar::new().add(cleared),
        Json(MessageResponse {
            message: "Logged out successfully".to_string(),
        }),
    )
}

pub async fn me(
    State(state): State<SharedState>,
    auth: AuthUser,
) -> Result<Json<Account>, AppError> {
    let account = db::accounts::find_by_id(&state.pool, auth.account_id)
        .await?
        .filter(|a| a.is_active)
        .ok_or_else(|| AppError::NotFound("Account not found".to_string()))?;

    Ok(Json(account))
}

use std::net::SocketAddr;

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use account_recovery::config::{Config, ResetConfig};
use account_recovery::models::PasswordReset;
use account_recovery::probe::{self, Backoff};
use account_recovery::state::SharedState;

pub const ADMIN_EMAIL: &str = "admin@dixai.net";
pub const ADMIN_PASSWORD: &str = "OldPassword123!";
pub const NEW_PASSWORD: &str = "NewPassword123!";

/// A running test server instance with a dedicated test database.
pub struct TestApp {
    pub addr: SocketAddr,
    pub pool: PgPool,
    pub client: Client,
    pub db_name: String,
    pub state: SharedState,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// POST a JSON body, return (body, status).
    pub async fn post(&self, path: &str, body: &Value) -> (Value, StatusCode) {
        let resp = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("post request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    /// Make an authenticated GET request.
    pub async fn get_auth(&self, path: &str, token: &str) -> (Value, StatusCode) {
        let resp = self
            .client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("get request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn register(&self, email: &str, password: &str) -> (Value, StatusCode) {
        self.post(
            "/auth/register",
            &json!({ "email": email, "password": password, "full_name": "Admin" }),
        )
        .await
    }

    pub async fn login(&self, email: &str, password: &str) -> (Value, StatusCode) {
        self.post("/auth/login", &json!({ "email": email, "password": password }))
            .await
    }

    pub async fn forgot_password(&self, email: &str) -> (Value, StatusCode) {
        self.post("/auth/forgot-password", &json!({ "email": email }))
            .await
    }

    pub async fn reset_password(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
    ) -> (Value, StatusCode) {
        self.post(
            "/auth/reset-password",
            &json!({ "email": email, "code": code, "new_password": new_password }),
        )
        .await
    }

    /// Register the standard admin account, return its access token.
    pub async fn bootstrap(&self) -> String {
        let (body, status) = self.register(ADMIN_EMAIL, ADMIN_PASSWORD).await;
        assert_eq!(status, StatusCode::OK, "bootstrap register failed: {body}");
        body["access_token"].as_str().unwrap().to_string()
    }

    /// All reset rows for a normalized email, newest first.
    pub async fn reset_rows(&self, email: &str) -> Vec<PasswordReset> {
        account_recovery::db::password_resets::list_by_email(&self.pool, email)
            .await
            .expect("listing reset rows failed")
    }

    /// Reset rows for a normalized email once at least `count` exist.
    ///
    /// Codes are issued in the background after forgot-password answers.
    pub async fn wait_for_rows(&self, email: &str, count: usize) -> Vec<PasswordReset> {
        let pool = &self.pool;
        let rows = probe::poll(&Backoff::default(), move || async move {
            let rows = account_recovery::db::password_resets::list_by_email(pool, email).await?;
            Ok::<_, sqlx::Error>((rows.len() >= count).then_some(rows))
        })
        .await
        .expect("listing reset rows failed");
        rows.unwrap_or_else(|| panic!("expected {count} reset rows for {email}"))
    }

    /// Newest redeemable code for the email, read with backoff.
    pub async fn latest_code(&self, email: &str) -> String {
        let pool = &self.pool;
        let row = probe::poll(&Backoff::default(), move || async move {
            account_recovery::db::password_resets::find_latest_active(pool, email).await
        })
        .await
        .expect("reading reset code failed");
        row.expect("no active reset code was issued").code
    }

    /// Request a reset and return the issued code.
    pub async fn issue_code(&self, request_email: &str) -> String {
        let before = self.reset_rows(ADMIN_EMAIL).await.len();
        let (body, status) = self.forgot_password(request_email).await;
        assert_eq!(status, StatusCode::OK, "forgot-password failed: {body}");
        assert_eq!(self.wait_for_rows(ADMIN_EMAIL, before + 1).await.len(), before + 1);
        self.latest_code(ADMIN_EMAIL).await
    }
}

pub fn test_config(database_url: String) -> Config {
    Config {
        database_url,
        jwt_secret: "test-jwt-secret-that-is-long-enough".to_string(),
        host: "127.0.0.1".parse().unwrap(),
        port: 0, // unused, we bind to random port
        max_body_size: 65_536,
        log_level: "warn".to_string(),
        reset: ResetConfig::default(),
        smtp: None,
    }
}

/// Spawn a test app with a fresh temporary database.
pub async fn spawn_app() -> TestApp {
    spawn_app_with(|_| {}).await
}

/// Spawn a test app after adjusting its config.
pub async fn spawn_app_with(tweak: impl FnOnce(&mut Config)) -> TestApp {
    let _ = dotenvy::dotenv();

    let base_url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set for tests");

    // Create a unique test database
    let db_name = format!("recovery_test_{}", Uuid::now_v7().to_string().replace('-', ""));

    // Connect to default postgres DB to create test DB
    let admin_url = base_url
        .rsplit_once('/')
        .map(|(base, _)| format!("{base}/postgres"))
        .unwrap_or_else(|| base_url.clone());

    let admin_pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&admin_url)
        .await
        .expect("Failed to connect to postgres for test DB creation");

    sqlx::query(&format!("CREATE DATABASE \"{db_name}\""))
        .execute(&admin_pool)
        .await
        .expect("Failed to create test database");

    admin_pool.close().await;

    // Connect to test DB and run migrations
    let test_url = base_url
        .rsplit_once('/')
        .map(|(base, _)| format!("{base}/{db_name}"))
        .unwrap_or_else(|| base_url.clone());

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&test_url)
        .await
        .expect("Failed to connect to test database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations on test database");

    let mut config = test_config(test_url);
    tweak(&mut config);

    let (app, state) = account_recovery::build_app(pool.clone(), config);

    // Bind to random port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to random port");
    let addr = listener.local_addr().unwrap();

    // Spawn server in background
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .expect("Server failed");
    });

    let client = Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    TestApp {
        addr,
        pool,
        client,
        db_name,
        state,
    }
}

/// Drop the test database after tests complete.
pub async fn cleanup(app: TestApp) {
    let db_name = app.db_name.clone();
    app.pool.close().await;

    let base_url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set for tests");
    let admin_url = base_url
        .rsplit_once('/')
        .map(|(base, _)| format!("{base}/postgres"))
        .unwrap_or_else(|| base_url.clone());

    let admin_pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&admin_url)
        .await
        .expect("Failed to connect for cleanup");

    let _ = sqlx::query(&format!("DROP DATABASE IF EXISTS \"{db_name}\" WITH (FORCE)"))
        .execute(&admin_pool)
        .await;

    admin_pool.close().await;
}

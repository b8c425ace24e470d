use std::net::IpAddr;

use chrono::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub host: IpAddr,
    pub port: u16,
    pub max_body_size: usize,
    pub log_level: String,
    pub reset: ResetConfig,
    pub smtp: Option<SmtpConfig>,
}

/// Knobs for reset code issuance and redemption.
#[derive(Debug, Clone)]
pub struct ResetConfig {
    pub code_ttl: Duration,
    pub code_length: usize,
    /// Reset requests allowed per email inside `throttle_window`.
    pub max_requests: u32,
    /// Failed confirmations allowed per email inside `throttle_window`.
    pub max_failed_confirms: u32,
    pub throttle_window: std::time::Duration,
}

impl Default for ResetConfig {
    fn default() -> Self {
        Self {
            code_ttl: Duration::minutes(15),
            code_length: 6,
            max_requests: 5,
            max_failed_confirms: 5,
            throttle_window: std::time::Duration::from_secs(15 * 60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
    pub from: String,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let database_url = env_required("DATABASE_URL")?;
        let jwt_secret = env_required("JWT_SECRET")?;

        let host: IpAddr = env_or("RECOVERY_HOST", "0.0.0.0")
            .parse()
            .map_err(|e| format!("Invalid RECOVERY_HOST: {e}"))?;

        let port: u16 = env_or("RECOVERY_PORT", "8000")
            .parse()
            .map_err(|e| format!("Invalid RECOVERY_PORT: {e}"))?;

        let max_body_size: usize = env_or("RECOVERY_MAX_BODY_SIZE", "65536")
            .parse()
            .map_err(|e| format!("Invalid RECOVERY_MAX_BODY_SIZE: {e}"))?;

        let log_level = env_or("RECOVERY_LOG_LEVEL", "info");

        let defaults = ResetConfig::default();

        let ttl_minutes: i64 = env_or(
            "RECOVERY_RESET_CODE_TTL_MINUTES",
            &defaults.code_ttl.num_minutes().to_string(),
        )
        .parse()
        .map_err(|e| format!("Invalid RECOVERY_RESET_CODE_TTL_MINUTES: {e}"))?;
        if ttl_minutes <= 0 {
            return Err("RECOVERY_RESET_CODE_TTL_MINUTES must be positive".to_string());
        }

        let code_length: usize = env_or(
            "RECOVERY_RESET_CODE_LENGTH",
            &defaults.code_length.to_string(),
        )
        .parse()
        .map_err(|e| format!("Invalid RECOVERY_RESET_CODE_LENGTH: {e}"))?;
        if !(4..=12).contains(&code_length) {
            return Err("RECOVERY_RESET_CODE_LENGTH must be between 4 and 12".to_string());
        }

        let reset = ResetConfig {
            code_ttl: Duration::minutes(ttl_minutes),
            code_length,
            ..defaults
        };

        let smtp = match (
            std::env::var("RECOVERY_SMTP_HOST").ok(),
            std::env::var("RECOVERY_SMTP_PORT").ok(),
            std::env::var("RECOVERY_SMTP_USER").ok(),
            std::env::var("RECOVERY_SMTP_PASS").ok(),
            std::env::var("RECOVERY_SMTP_FROM").ok(),
        ) {
            (Some(host), Some(port), Some(user), Some(pass), Some(from)) => Some(SmtpConfig {
                host,
                port: port
                    .parse()
                    .map_err(|e| format!("Invalid RECOVERY_SMTP_PORT: {e}"))?,
                user,
                pass,
                from,
            }),
            _ => None,
        };

        Ok(Config {
            database_url,
            jwt_secret,
            host,
            port,
            max_body_size,
            log_level,
            reset,
            smtp,
        })
    }
}

fn env_required(key: &str) -> Result<String, String> {
    std::env::var(key).map_err(|_| format!("Missing required environment variable: {key}"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

pub mod templates;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::SmtpConfig;

/// Delivers reset codes to account owners.
#[async_trait]
pub trait ResetNotifier: Send + Sync {
    async fn send_reset_code(&self, to_email: &str, code: &str, ttl_minutes: i64)
        -> Result<(), String>;
}

pub struct SystemMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SystemMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, String> {
        let creds = Credentials::new(config.user.clone(), config.pass.clone());

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| format!("System SMTP error: {e}"))?
            .port(config.port)
            .credentials(creds)
            .build();

        Ok(Self {
            transport,
            from: config.from.clone(),
        })
    }

    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), String> {
        let message = Message::builder()
            .from(
                self.from
                    .parse()
                    .map_err(|e| format!("Invalid from address: {e}"))?,
            )
            .to(to.parse().map_err(|e| format!("Invalid to address: {e}"))?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html_body.to_string())
            .map_err(|e| format!("Failed to build email: {e}"))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| format!("Failed to send email: {e}"))?;

        Ok(())
    }
}

#[async_trait]
impl ResetNotifier for SystemMailer {
    async fn send_reset_code(
        &self,
        to_email: &str,
        code: &str,
        ttl_minutes: i64,
    ) -> Result<(), String> {
        let html = templates::render_reset_code(code, ttl_minutes);
        self.send(to_email, "Your password reset code", &html).await
    }
}

/// Fallback when no SMTP relay is configured: the code goes to the log.
pub struct LogNotifier;

#[async_trait]
impl ResetNotifier for LogNotifier {
    async fn send_reset_code(
        &self,
        to_email: &str,
        code: &str,
        ttl_minutes: i64,
    ) -> Result<(), String> {
        tracing::warn!(
            "SMTP not configured. Password reset code for {to_email}: {code} (valid {ttl_minutes} min)"
        );
        Ok(())
    }
}

//! Verification mail delivery
//!
//! `LogMailer` is the default transport: it records the message through the
//! structured log instead of speaking SMTP, which is enough for sandbox and
//! staging environments. The trait is the seam for a real transport.

use crate::config::SmtpConfig;
use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Mail delivery failed: {message}")]
    Delivery { message: String },
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_otp(
        &self,
        to: &str,
        user_name: Option<&str>,
        code: &str,
        expires_in_seconds: i64,
    ) -> Result<(), MailError>;
}

/// Log-backed mailer
pub struct LogMailer {
    config: SmtpConfig,
}

impl LogMailer {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send_otp(
        &self,
        to: &str,
        user_name: Option<&str>,
        code: &str,
        expires_in_seconds: i64,
    ) -> Result<(), MailError> {
        info!(
            to = %to,
            from = %self.config.from_address,
            recipient_name = user_name.unwrap_or("customer"),
            code = %code,
            expires_in_seconds,
            "verification code email"
        );
        Ok(())
    }
}

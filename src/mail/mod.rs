//! Outbound mail abstraction
//!
//! Handlers hand messages to a [`Mailer`]. The shipped [`LogMailer`] writes
//! them to the log instead of delivering them.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub to: String,
    pub from: String,
    pub reply_to: Option<String>,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail delivery failed: {0}")]
    Delivery(String),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: MailMessage) -> Result<(), MailError>;
}

/// Logs each message at info level.
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: MailMessage) -> Result<(), MailError> {
        tracing::info!(
            to = %message.to,
            from = %message.from,
            reply_to = message.reply_to.as_deref().unwrap_or(""),
            subject = %message.subject,
            "Mail queued (log only)"
        );
        tracing::debug!(body = %message.body, "Mail body");
        Ok(())
    }
}

/// Reset-password message pointing at the frontend reset page.
pub fn password_reset_message(to: &str, from: &str, reset_url: &str) -> MailMessage {
    MailMessage {
        to: to.to_string(),
        from: from.to_string(),
        reply_to: None,
        subject: "Your password reset token (valid for 10 minutes)".to_string(),
        body: format!(
            "Forgot your password? Submit a PATCH request with your new password and password_confirm to: {}\n\
             If you didn't forget your password, please ignore this email.",
            reset_url
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_mailer_accepts_messages() {
        let message = password_reset_message("a@example.com", "no-reply@localhost", "http://x/reset/abc");
        assert!(message.body.contains("http://x/reset/abc"));
        assert!(LogMailer.send(message).await.is_ok());
    }
}

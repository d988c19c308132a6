//! Mail transport adapters.

use async_trait::async_trait;
use hotelbook_core::mail::{EmailMessage, MailError, Mailer};
use tracing::info;

/// Default sender of outbound messages.
pub const DEFAULT_SENDER: &str = "Hotel Booking System <noreply@hotelbook.local>";

/// Logs each message instead of transmitting it. Stands in for an SMTP
/// transport.
#[derive(Debug, Clone)]
pub struct TracingMailer {
    sender: String,
}

impl TracingMailer {
    /// Creates a mailer sending as `sender`.
    #[must_use]
    pub fn new(sender: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
        }
    }
}

impl Default for TracingMailer {
    fn default() -> Self {
        Self::new(DEFAULT_SENDER)
    }
}

#[async_trait]
impl Mailer for TracingMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        if message.to.trim().is_empty() {
            return Err(MailError::Rejected("message has no recipient".into()));
        }
        info!(
            from = %self.sender,
            to = %message.to,
            subject = %message.subject,
            html_len = message.html.len(),
            "email sent"
        );
        Ok(())
    }
}

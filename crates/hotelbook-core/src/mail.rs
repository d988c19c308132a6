//! Outbound email port.

use async_trait::async_trait;
use thiserror::Error;

/// A rendered email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub text: String,
    /// HTML body.
    pub html: String,
}

/// Failure to hand a message to the mail transport.
#[derive(Debug, Error)]
pub enum MailError {
    /// The transport could not be reached.
    #[error("mail transport error: {0}")]
    Transport(String),

    /// The transport refused the message.
    #[error("mail rejected: {0}")]
    Rejected(String),
}

/// Transmits rendered emails.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Sends one message.
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError>;
}

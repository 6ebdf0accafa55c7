//! Mail delivery
//!
//! Notifications leave the process through a [`MailTransport`]. The
//! production transport is the SendGrid v3 API.

mod sendgrid;

use async_trait::async_trait;
use notifier_core::types::NotificationMessage;
use thiserror::Error;

pub use sendgrid::SendGridClient;

/// Outcome of an accepted send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    pub status_code: u16,
}

/// Reasons a notification could not be handed to the mail service
#[derive(Error, Debug)]
pub enum MailError {
    #[error("no mail API key configured")]
    MissingApiKey,

    #[error("no recipients configured")]
    NoRecipients,

    #[error("mail API request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("mail API returned status {status}: {body}")]
    Rejected { status: u16, body: String },
}

impl From<MailError> for notifier_core::Error {
    fn from(err: MailError) -> Self {
        notifier_core::Error::MailDeliveryFailure(err.to_string())
    }
}

#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Submit a message to the mail service.
    async fn send(&self, message: &NotificationMessage) -> Result<DeliveryReceipt, MailError>;
}

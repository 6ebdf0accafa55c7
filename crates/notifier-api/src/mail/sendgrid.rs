//! SendGrid v3 mail client

use std::time::Duration;

use async_trait::async_trait;
use notifier_core::config::SendGridConfig;
use notifier_core::types::NotificationMessage;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use super::{DeliveryReceipt, MailError, MailTransport};

const MAIL_SEND_PATH: &str = "/v3/mail/send";

#[derive(Debug, Serialize)]
struct MailSendRequest<'a> {
    personalizations: Vec<Personalization<'a>>,
    from: Address<'a>,
    subject: &'a str,
    content: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Personalization<'a> {
    to: Vec<Address<'a>>,
}

#[derive(Debug, Serialize)]
struct Address<'a> {
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(rename = "type")]
    content_type: &'a str,
    value: &'a str,
}

impl<'a> From<&'a NotificationMessage> for MailSendRequest<'a> {
    fn from(message: &'a NotificationMessage) -> Self {
        Self {
            personalizations: vec![Personalization {
                to: message
                    .to
                    .iter()
                    .map(|email| Address {
                        email: email.as_str(),
                    })
                    .collect(),
            }],
            from: Address {
                email: message.from.as_str(),
            },
            subject: message.subject.as_str(),
            content: vec![Content {
                content_type: "text/html",
                value: message.html_body.as_str(),
            }],
        }
    }
}

/// Sends notifications through the SendGrid mail API
#[derive(Debug, Clone)]
pub struct SendGridClient {
    http_client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl SendGridClient {
    pub fn new(config: &SendGridConfig) -> notifier_core::Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                notifier_core::Error::InternalError(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            http_client,
            endpoint: format!("{}{}", config.api_url.trim_end_matches('/'), MAIL_SEND_PATH),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
        })
    }
}

#[async_trait]
impl MailTransport for SendGridClient {
    async fn send(&self, message: &NotificationMessage) -> Result<DeliveryReceipt, MailError> {
        let api_key = self.api_key.as_deref().ok_or(MailError::MissingApiKey)?;
        if message.to.is_empty() {
            return Err(MailError::NoRecipients);
        }

        debug!("POST {} for {} recipient(s)", self.endpoint, message.to.len());

        let response = self
            .http_client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&MailSendRequest::from(message))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(DeliveryReceipt {
                status_code: status.as_u16(),
            })
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(MailError::Rejected {
                status: status.as_u16(),
                body,
            })
        }
    }
}

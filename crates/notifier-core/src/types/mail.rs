//! Notification message types

use serde::{Deserialize, Serialize};

/// Sender of every notification
pub const NOTIFICATION_FROM: &str = "noreply@bigquery-pipeline.com";

/// Subject of every notification
pub const NOTIFICATION_SUBJECT: &str = "A new chart from BigQuery Pipeline";

/// Browser URL of a stored object
pub fn object_url(bucket: &str, name: &str) -> String {
    format!("https://storage.cloud.google.com/{}/{}", bucket, name)
}

/// An email announcing a newly created object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub html_body: String,
}

impl NotificationMessage {
    /// Build the notification for `bucket`/`name`, addressed to `recipients`.
    pub fn for_object(bucket: &str, name: &str, recipients: &[String]) -> Self {
        let url = object_url(bucket, name);
        Self {
            from: NOTIFICATION_FROM.to_string(),
            to: recipients.to_vec(),
            subject: NOTIFICATION_SUBJECT.to_string(),
            html_body: format!(
                "<html><p>A new chart is available for you to view: \
                 <a href=\"{url}\">{url}</a></p><img src=\"{url}\"></img></html>"
            ),
        }
    }
}

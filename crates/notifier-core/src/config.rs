//! Configuration for the notifier

use serde::{Deserialize, Serialize};

use crate::filter::BucketFilter;
use crate::utils::parse_address_list;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifierConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub notification: NotificationConfig,

    #[serde(default)]
    pub sendgrid: SendGridConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl NotifierConfig {
    pub fn from_file(path: &str) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::InvalidConfig(format!("Failed to read config: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| crate::Error::InvalidConfig(format!("Failed to parse config: {}", e)))
    }

    pub fn from_env() -> crate::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> crate::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = lookup("NOTIFIER_BIND_ADDRESS") {
            config.server.bind_address = addr;
        }
        if let Some(port) = lookup("PORT") {
            config.server.port = parse_var("PORT", &port)?;
        }

        if let Some(bucket) = lookup("BUCKET") {
            config.notification.expected_bucket = Some(bucket);
        }
        if let Some(to) = lookup("TO_EMAILS") {
            config.notification.to_emails = parse_address_list(&to);
        }

        if let Some(key) = lookup("SENDGRID_API_KEY") {
            config.sendgrid.api_key = Some(key);
        }
        if let Some(url) = lookup("SENDGRID_API_URL") {
            config.sendgrid.api_url = url;
        }
        if let Some(timeout) = lookup("SENDGRID_TIMEOUT_SECS") {
            config.sendgrid.timeout_secs = parse_var("SENDGRID_TIMEOUT_SECS", &timeout)?;
        }

        if let Some(level) = lookup("NOTIFIER_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Some(format) = lookup("NOTIFIER_LOG_FORMAT") {
            config.logging.format = format;
        }

        Ok(config)
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.sendgrid.timeout_secs == 0 {
            return Err(crate::Error::InvalidConfig(
                "sendgrid.timeout_secs must be greater than zero".into(),
            ));
        }
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(crate::Error::InvalidConfig(format!(
                "Unknown log format: {}",
                self.logging.format
            )));
        }
        Ok(())
    }

    pub fn bucket_filter(&self) -> BucketFilter {
        BucketFilter::new(self.notification.expected_bucket.clone())
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> crate::Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| crate::Error::InvalidConfig(format!("Invalid {}: '{}'", name, value)))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: crate::DEFAULT_PORT,
        }
    }
}

/// What to notify about and whom to tell
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Only events for this bucket are notified; unset or empty admits all
    #[serde(default)]
    pub expected_bucket: Option<String>,
    /// Notification recipients
    #[serde(default)]
    pub to_emails: Vec<String>,
}

/// SendGrid mail API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendGridConfig {
    /// API key, sent as a bearer token
    #[serde(default)]
    pub api_key: Option<String>,
    /// Base URL of the API
    #[serde(default = "default_sendgrid_url")]
    pub api_url: String,
    /// Request timeout in seconds
    #[serde(default = "default_sendgrid_timeout")]
    pub timeout_secs: u64,
}

fn default_sendgrid_url() -> String {
    "https://api.sendgrid.com".to_string()
}

fn default_sendgrid_timeout() -> u64 {
    crate::DEFAULT_MAIL_TIMEOUT_SECS
}

impl Default for SendGridConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_sendgrid_url(),
            timeout_secs: default_sendgrid_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

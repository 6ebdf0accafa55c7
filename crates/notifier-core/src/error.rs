//! Error types for the notifier

use thiserror::Error;

use crate::types::DecodeError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // Request Errors
    #[error("Malformed payload: {0}")]
    MalformedPayload(#[from] DecodeError),

    // Delivery Errors
    #[error("Mail delivery failed: {0}")]
    MailDeliveryFailure(String),

    // Configuration Errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Internal Errors
    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn code(&self) -> &'static str {
        match self {
            Error::MalformedPayload(_) => "MalformedPayload",
            Error::MailDeliveryFailure(_) => "MailDeliveryFailure",
            Error::InvalidConfig(_) => "InvalidConfig",
            Error::InternalError(_) => "InternalError",
            Error::Io(_) => "InternalError",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Error::MalformedPayload(_) => 400,

            _ => 500,
        }
    }
}

//! Notifier Core Library
//!
//! Configuration, error types, event decoding and message construction for
//! the storage object notifier.

pub mod config;
pub mod error;
pub mod filter;
pub mod types;
pub mod utils;

pub use config::NotifierConfig;
pub use error::{Error, Result};
pub use filter::BucketFilter;

/// Notifier version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default listening port
pub const DEFAULT_PORT: u16 = 8080;

/// Default mail API request timeout in seconds
pub const DEFAULT_MAIL_TIMEOUT_SECS: u64 = 30;

//! HTTP endpoint relaying storage object events as notification emails

pub mod mail;
pub mod metrics;
pub mod routes;
pub mod server;

pub use mail::{MailTransport, SendGridClient};
pub use metrics::MetricsRecorder;
pub use server::{create_router, AppState, NotifierServer};

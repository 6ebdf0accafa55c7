//! Core types for the notifier

mod event;
mod mail;

pub use event::*;
pub use mail::*;

//! Arrival notifications for gatehouse.
//!
//! This crate provides:
//!
//! - **Notice**: the fixed-template message describing a completed check-in
//! - **Notifier**: the `ArrivalNotifier` capability used by the conversation engine
//! - **SMTP**: the production notifier that emails a single configured recipient

pub mod error;
pub mod notice;
pub mod notifier;
pub mod smtp;

pub use error::NotifyError;
pub use notice::ArrivalNotice;
pub use notifier::{ArrivalNotifier, RecordingNotifier};
pub use smtp::{SmtpArrivalNotifier, SmtpConfig, SmtpSecurity};

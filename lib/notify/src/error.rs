//! Error types for the notify crate.

use std::fmt;

/// Errors from composing or dispatching a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    /// A configured address could not be parsed.
    InvalidAddress { field: &'static str, reason: String },
    /// The transport could not be configured.
    InvalidTransport { reason: String },
    /// The message could not be assembled.
    BuildFailed { reason: String },
    /// The transport refused or failed to send the message.
    TransportFailed { reason: String },
}

impl fmt::Display for NotifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidAddress { field, reason } => {
                write!(f, "invalid {field} address: {reason}")
            }
            Self::InvalidTransport { reason } => {
                write!(f, "invalid mail transport configuration: {reason}")
            }
            Self::BuildFailed { reason } => write!(f, "failed to build notification: {reason}"),
            Self::TransportFailed { reason } => {
                write!(f, "failed to send notification: {reason}")
            }
        }
    }
}

impl std::error::Error for NotifyError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_address_display() {
        let err = NotifyError::InvalidAddress {
            field: "recipient",
            reason: "missing domain".to_string(),
        };
        assert!(err.to_string().contains("recipient"));
        assert!(err.to_string().contains("missing domain"));
    }
}

//! Error types for the registry crate.
//!
//! The variants mirror how the conversation layer has to react:
//! - `StoreUnavailable`: the store cannot be reached at all, retrying later may work
//! - `OperationFailed`: a specific read or write was rejected by the store
//! - `Unexpected`: the store answered with something we could not interpret

use std::fmt;

/// Errors from driver registry operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The backing store is missing or unreachable.
    StoreUnavailable { reason: String },
    /// A read or write failed (constraint violation, dangling reference, SQL error).
    OperationFailed {
        operation: &'static str,
        reason: String,
    },
    /// Anything else, such as a row that could not be decoded.
    Unexpected {
        operation: &'static str,
        reason: String,
    },
}

impl RegistryError {
    /// Returns true if the store itself could not be reached.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::StoreUnavailable { .. })
    }
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StoreUnavailable { reason } => write!(f, "driver store unavailable: {reason}"),
            Self::OperationFailed { operation, reason } => {
                write!(f, "driver store {operation} failed: {reason}")
            }
            Self::Unexpected { operation, reason } => {
                write!(f, "unexpected driver store error during {operation}: {reason}")
            }
        }
    }
}

impl std::error::Error for RegistryError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_display() {
        let err = RegistryError::StoreUnavailable {
            reason: "no store at /tmp/missing.db".to_string(),
        };
        assert!(err.is_unavailable());
        assert!(err.to_string().contains("/tmp/missing.db"));
    }

    #[test]
    fn operation_failed_display() {
        let err = RegistryError::OperationFailed {
            operation: "create",
            reason: "UNIQUE constraint failed: drivers.dni".to_string(),
        };
        assert!(!err.is_unavailable());
        assert!(err.to_string().contains("create"));
        assert!(err.to_string().contains("drivers.dni"));
    }
}

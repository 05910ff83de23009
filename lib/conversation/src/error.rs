//! Error types for the conversation crate.
//!
//! `CheckInError` collects everything that can go wrong while a turn talks
//! to the registry or the notifier. The engine turns each one into exactly
//! one reply and one log entry, keyed by its [`ErrorKind`].

use gatehouse_core::Dni;
use gatehouse_notify::NotifyError;
use gatehouse_registry::RegistryError;
use std::fmt;

/// How a failure is reported to the user and what happens to their session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Store missing or unreachable; the user can resend the same answer.
    StoreUnavailable,
    /// A read or write was rejected; the session is dropped.
    StoreOperationFailed,
    /// The arrival was saved but the notification failed.
    NotificationFailed,
    /// Anything else.
    Unexpected,
}

/// Errors raised while handling a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckInError {
    /// A registry operation failed.
    Registry {
        source: RegistryError,
        /// Whether an earlier write in the same turn had already succeeded.
        after_write: bool,
    },
    /// The arrival notice could not be sent.
    Notification {
        name: String,
        dni: Dni,
        source: NotifyError,
    },
    /// The session claims a state whose collected data is missing.
    InconsistentSession { state: &'static str, missing: &'static str },
}

impl CheckInError {
    /// Wraps a registry error raised before anything was written this turn.
    #[must_use]
    pub fn registry(source: RegistryError) -> Self {
        Self::Registry {
            source,
            after_write: false,
        }
    }

    /// Wraps a registry error raised after a successful write this turn.
    #[must_use]
    pub fn registry_after_write(source: RegistryError) -> Self {
        Self::Registry {
            source,
            after_write: true,
        }
    }

    /// Classifies the error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Registry { source, .. } => match source {
                RegistryError::StoreUnavailable { .. } => ErrorKind::StoreUnavailable,
                RegistryError::OperationFailed { .. } => ErrorKind::StoreOperationFailed,
                RegistryError::Unexpected { .. } => ErrorKind::Unexpected,
            },
            Self::Notification { .. } => ErrorKind::NotificationFailed,
            Self::InconsistentSession { .. } => ErrorKind::Unexpected,
        }
    }

    /// Returns the driver a failed notification was about.
    #[must_use]
    pub fn driver_name(&self) -> Option<&str> {
        match self {
            Self::Notification { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Returns true if the user's session must be dropped.
    ///
    /// Unavailable stores keep the session so the same answer can be resent.
    /// Unexpected failures keep it too, unless something was already written
    /// or the session itself is the problem.
    #[must_use]
    pub fn clears_session(&self) -> bool {
        match self {
            Self::Registry {
                source: RegistryError::StoreUnavailable { .. },
                ..
            } => false,
            Self::Registry {
                source: RegistryError::OperationFailed { .. },
                ..
            } => true,
            Self::Registry {
                source: RegistryError::Unexpected { .. },
                after_write,
            } => *after_write,
            Self::Notification { .. } | Self::InconsistentSession { .. } => true,
        }
    }
}

impl fmt::Display for CheckInError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registry { source, .. } => write!(f, "{source}"),
            Self::Notification { name, dni, source } => {
                write!(f, "arrival of {name} ({dni}) saved but not notified: {source}")
            }
            Self::InconsistentSession { state, missing } => {
                write!(f, "session in state {state} is missing its {missing}")
            }
        }
    }
}

impl std::error::Error for CheckInError {}

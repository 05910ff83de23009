//! The arrival notifier capability.

use crate::error::NotifyError;
use crate::notice::ArrivalNotice;
use async_trait::async_trait;
use std::sync::{Mutex, PoisonError};

/// Trait for dispatching arrival notices.
///
/// A send is attempted exactly once. Success means the transport accepted
/// the message, nothing more.
#[async_trait]
pub trait ArrivalNotifier: Send + Sync {
    /// Sends a notice describing a completed check-in.
    async fn notify(&self, notice: &ArrivalNotice) -> Result<(), NotifyError>;
}

/// A notifier that remembers every notice instead of sending it.
///
/// Can be configured to fail, in which case the notice is still recorded as
/// attempted.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    /// If set, every send fails with this error.
    pub fail_with: Option<NotifyError>,
    sent: Mutex<Vec<ArrivalNotice>>,
}

impl RecordingNotifier {
    /// Creates a notifier whose sends always succeed.
    #[must_use]
    pub fn succeeding() -> Self {
        Self::default()
    }

    /// Creates a notifier whose sends always fail with `error`.
    #[must_use]
    pub fn failing(error: NotifyError) -> Self {
        Self {
            fail_with: Some(error),
            sent: Mutex::default(),
        }
    }

    /// Returns every notice passed to `notify`, in order.
    #[must_use]
    pub fn sent(&self) -> Vec<ArrivalNotice> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ArrivalNotifier for RecordingNotifier {
    async fn notify(&self, notice: &ArrivalNotice) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notice.clone());
        match &self.fail_with {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

//! Single-assignment failure cell shared by the capture and callback threads.

use crate::capture::CaptureError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::warn;

/// Thread that recorded a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorOrigin {
    Capture,
    Callback,
}

impl std::fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorOrigin::Capture => write!(f, "capture"),
            ErrorOrigin::Callback => write!(f, "callback"),
        }
    }
}

/// Holds the first failure of a cycle.
///
/// The winner is decided by a compare-and-set on `occupied`, so the earliest
/// `record` call wins regardless of which thread makes it. Later failures are
/// logged and dropped.
#[derive(Debug, Default)]
pub(crate) struct ErrorSlot {
    occupied: AtomicBool,
    error: Mutex<Option<(ErrorOrigin, CaptureError)>>,
}

impl ErrorSlot {
    /// Store `error` unless a failure is already recorded. Returns whether it
    /// was stored.
    pub(crate) fn record(&self, origin: ErrorOrigin, error: CaptureError) -> bool {
        if self
            .occupied
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("Discarding {} error after an earlier failure: {}", origin, error);
            return false;
        }
        *self.error.lock().unwrap_or_else(PoisonError::into_inner) = Some((origin, error));
        true
    }

    pub(crate) fn is_set(&self) -> bool {
        self.occupied.load(Ordering::SeqCst)
    }

    /// Take the recorded failure and clear the slot.
    ///
    /// Only called once both threads have stopped recording.
    pub(crate) fn take(&self) -> Option<(ErrorOrigin, CaptureError)> {
        let taken = self.error.lock().unwrap_or_else(PoisonError::into_inner).take();
        self.occupied.store(false, Ordering::SeqCst);
        taken
    }
}

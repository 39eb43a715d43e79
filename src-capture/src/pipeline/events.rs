//! Notifications raised by the pipeline.

use super::stats::CaptureStats;
use crate::capture::{CallbackError, CaptureError, DisplaySelector, Frame};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// Direct callback passed to `start_capture`, invoked before the listeners.
pub type FrameCallback = Box<dyn FnMut(&Frame) -> Result<(), CallbackError> + Send + 'static>;

/// Listener notified of every delivered frame.
pub type FrameListener = dyn Fn(&FrameProduced<'_>) -> Result<(), CallbackError> + Send + Sync;

/// Listener notified once at the end of every cycle.
pub type StopListener = dyn Fn(&CaptureStopped) + Send + Sync;

/// A frame being delivered on the callback thread.
///
/// The frame is borrowed for the duration of the notification. Copy what you
/// need, or enable buffer preservation to receive ownership afterwards.
#[derive(Debug, Clone, Copy)]
pub struct FrameProduced<'a> {
    pub frame: &'a Frame,
    pub selector: DisplaySelector,
}

/// End of a capture cycle.
#[derive(Debug)]
pub struct CaptureStopped {
    pub selector: DisplaySelector,
    /// The first failure of the cycle; `None` after a requested stop.
    pub error: Option<CaptureError>,
    pub stats: CaptureStats,
}

impl CaptureStopped {
    pub fn is_clean(&self) -> bool {
        self.error.is_none()
    }
}

/// Handle returned when registering a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Registration-ordered listener list.
///
/// Notification works on a snapshot, so listeners may (un)register listeners
/// while being notified.
pub(crate) struct Listeners<F: ?Sized> {
    next_id: AtomicU64,
    entries: RwLock<Vec<(ListenerId, Arc<F>)>>,
}

impl<F: ?Sized> Listeners<F> {
    pub(crate) fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            entries: RwLock::new(Vec::new()),
        }
    }

    pub(crate) fn add(&self, listener: Arc<F>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, listener));
        id
    }

    pub(crate) fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }

    pub(crate) fn snapshot(&self) -> Vec<Arc<F>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect()
    }
}

//! Lifecycle state shared by the caller, the capture thread and the callback
//! thread.

use serde::Serialize;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of a capture pipeline.
///
/// A cycle always runs `Inactive → Starting → Active → Stopping → Inactive`.
/// The only shortcut is `Starting → Stopping` when the session cannot be opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Status {
    Inactive = 0,
    Starting = 1,
    Active = 2,
    Stopping = 3,
}

impl Status {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Status::Starting,
            2 => Status::Active,
            3 => Status::Stopping,
            _ => Status::Inactive,
        }
    }

    /// Whether the callback thread should keep polling for frames.
    pub fn is_running(self) -> bool {
        matches!(self, Status::Starting | Status::Active)
    }

    /// Whether `self → next` is a legal transition.
    pub fn can_advance_to(self, next: Status) -> bool {
        matches!(
            (self, next),
            (Status::Inactive, Status::Starting)
                | (Status::Starting, Status::Active)
                | (Status::Starting, Status::Stopping)
                | (Status::Active, Status::Stopping)
                | (Status::Stopping, Status::Inactive)
        )
    }
}

/// Atomically shared [`Status`]. Every access is sequentially consistent.
#[derive(Debug)]
pub(crate) struct AtomicStatus(AtomicU8);

impl AtomicStatus {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(Status::Inactive as u8))
    }

    pub(crate) fn load(&self) -> Status {
        Status::from_u8(self.0.load(Ordering::SeqCst))
    }

    /// Move from `from` to `to` if the current status is `from`.
    ///
    /// Returns false, leaving the status untouched, when another actor got
    /// there first.
    pub(crate) fn advance(&self, from: Status, to: Status) -> bool {
        debug_assert!(from.can_advance_to(to), "illegal transition {:?} -> {:?}", from, to);
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Enter `Stopping` from either running state. No-op otherwise.
    pub(crate) fn begin_stopping(&self) -> bool {
        self.advance(Status::Active, Status::Stopping)
            || self.advance(Status::Starting, Status::Stopping)
    }
}

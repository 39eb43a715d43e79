//! Frame source contract and frame types.
//!
//! A [`FrameSource`] opens a [`CaptureSession`] for one display. The session
//! maps frames on demand; the caller copies each mapped frame into an owned
//! [`Frame`] and releases the mapping before asking for the next one.

pub mod error;
pub mod pool;
pub mod screenshot;
pub mod types;

#[cfg(feature = "screenshots")]
pub mod screenshots_source;

#[cfg(test)]
pub(crate) mod testing;

use std::time::Duration;

pub use error::{CallbackError, CaptureError, SourceError};
pub use pool::{BufferPool, PooledBuffer, DEFAULT_MAX_POOLED_BUFFERS};
pub use screenshot::{Screenshotter, DEFAULT_SCREENSHOT_TIMEOUT};
pub use types::{Acquired, DisplaySelector, Frame, MappedFrame, PixelFormat};

#[cfg(feature = "screenshots")]
pub use screenshots_source::ScreenshotsSource;

/// Factory for capture sessions.
///
/// Shared between threads; sessions themselves are opened and used on a
/// single thread and need not be `Send`.
pub trait FrameSource: Send + Sync + 'static {
    type Session: CaptureSession;

    /// Open a session duplicating the selected display.
    fn open(&self, selector: DisplaySelector) -> Result<Self::Session, SourceError>;
}

/// An open duplication of one display.
pub trait CaptureSession {
    /// Wait up to `timeout` for the next frame.
    ///
    /// Every `Ready` result must be followed by exactly one
    /// [`release_frame`](Self::release_frame) before the next acquire.
    fn try_acquire_next_frame(&mut self, timeout: Duration) -> Result<Acquired<'_>, SourceError>;

    /// Release the frame returned by the last successful acquire.
    fn release_frame(&mut self) -> Result<(), SourceError>;

    /// Release the session's native resources. Called once, last.
    fn close(&mut self);
}

/// Acquire, copy and release one frame.
///
/// Returns `Ok(None)` on timeout. A mapped frame is released even when
/// copying it fails; a release failure is logged and otherwise ignored.
pub(crate) fn acquire_frame<C: CaptureSession>(
    session: &mut C,
    timeout: Duration,
    number: u64,
    pool: &std::sync::Arc<BufferPool>,
) -> Result<Option<Frame>, CaptureError> {
    let copied = match session.try_acquire_next_frame(timeout) {
        Ok(Acquired::Ready(mapped)) => Frame::copy_from(&mapped, number, pool),
        Ok(Acquired::TimedOut) => return Ok(None),
        Err(e) => return Err(CaptureError::AcquireFatal(e)),
    };

    if let Err(e) = session.release_frame() {
        tracing::warn!("Failed to release frame {}: {}", number, e);
    }

    copied.map(Some)
}

//! One-shot synchronous screenshots.
//!
//! Opening a duplication session is far more expensive than acquiring a frame,
//! so the session for the last selector stays open between calls and is only
//! reopened when a different display is requested.

use super::{acquire_frame, BufferPool, CaptureError, CaptureSession, DisplaySelector, Frame, FrameSource};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Default upper bound on waiting for a screenshot.
pub const DEFAULT_SCREENSHOT_TIMEOUT: Duration = Duration::from_secs(60);

/// Longest single wait handed to the session, so a long timeout is still
/// made of short acquire calls.
const ACQUIRE_SLICE: Duration = Duration::from_millis(100);

struct CachedSession<C> {
    selector: DisplaySelector,
    session: C,
    frames: u64,
}

/// Takes single frames from a [`FrameSource`], caching the open session.
pub struct Screenshotter<S: FrameSource> {
    source: S,
    cached: Option<CachedSession<S::Session>>,
    pool: Arc<BufferPool>,
}

impl<S: FrameSource> Screenshotter<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            cached: None,
            pool: BufferPool::new(1),
        }
    }

    /// Capture display 0 on adapter 0 with the default timeout.
    pub fn capture_primary(&mut self) -> Result<Frame, CaptureError> {
        self.capture(DisplaySelector::default(), DEFAULT_SCREENSHOT_TIMEOUT)
    }

    /// Wait up to `max_timeout` for the next frame of `selector`.
    pub fn capture(
        &mut self,
        selector: DisplaySelector,
        max_timeout: Duration,
    ) -> Result<Frame, CaptureError> {
        self.ensure_session(selector)?;
        let deadline = Instant::now() + max_timeout;

        loop {
            let Some(cached) = self.cached.as_mut() else {
                break Err(CaptureError::AcquireTimeout(max_timeout));
            };
            let slice = deadline
                .saturating_duration_since(Instant::now())
                .min(ACQUIRE_SLICE);

            match acquire_frame(&mut cached.session, slice, cached.frames + 1, &self.pool) {
                Ok(Some(frame)) => {
                    cached.frames += 1;
                    break Ok(frame);
                }
                Ok(None) if Instant::now() >= deadline => {
                    break Err(CaptureError::AcquireTimeout(max_timeout));
                }
                Ok(None) => continue,
                Err(e) => {
                    warn!("Screenshot of {} failed: {}", selector, e);
                    self.reset();
                    break Err(e);
                }
            }
        }
    }

    /// Close the cached session, if any.
    pub fn reset(&mut self) {
        if let Some(mut cached) = self.cached.take() {
            debug!("Closing screenshot session for {}", cached.selector);
            cached.session.close();
        }
    }

    /// Selector of the currently open session.
    pub fn open_selector(&self) -> Option<DisplaySelector> {
        self.cached.as_ref().map(|cached| cached.selector)
    }

    fn ensure_session(&mut self, selector: DisplaySelector) -> Result<(), CaptureError> {
        if self.open_selector() == Some(selector) {
            return Ok(());
        }
        self.reset();

        let session = self
            .source
            .open(selector)
            .map_err(|source| CaptureError::SourceUnavailable {
                display: selector.display_index,
                adapter: selector.adapter_index,
                source,
            })?;
        debug!("Opened screenshot session for {}", selector);

        self.cached = Some(CachedSession {
            selector,
            session,
            frames: 0,
        });
        Ok(())
    }
}

impl<S: FrameSource> Drop for Screenshotter<S> {
    fn drop(&mut self) {
        self.reset();
    }
}

//! Display capture through the `screenshots` crate.
//!
//! The crate grabs whole-screen images on demand rather than pushing frames,
//! so the session paces itself to a target frame interval and reports
//! `TimedOut` while the next frame is not yet due.

use super::{Acquired, CaptureSession, DisplaySelector, FrameSource, MappedFrame, PixelFormat, SourceError};
use screenshots::Screen;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Default pacing: 30 frames per second.
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(33);

/// [`FrameSource`] capturing a physical screen.
///
/// The crate exposes a single adapter, so only adapter index 0 is valid.
#[derive(Debug, Clone)]
pub struct ScreenshotsSource {
    frame_interval: Duration,
}

impl ScreenshotsSource {
    pub fn new() -> Self {
        Self::with_frame_interval(DEFAULT_FRAME_INTERVAL)
    }

    pub fn with_frame_interval(frame_interval: Duration) -> Self {
        Self { frame_interval }
    }
}

impl Default for ScreenshotsSource {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSource for ScreenshotsSource {
    type Session = ScreenshotsSession;

    fn open(&self, selector: DisplaySelector) -> Result<ScreenshotsSession, SourceError> {
        if selector.adapter_index != 0 {
            return Err(SourceError::AdapterNotFound(selector.adapter_index));
        }

        let screens =
            Screen::all().map_err(|e| SourceError::platform("failed to enumerate screens", e))?;
        debug!("Detected {} screen(s)", screens.len());

        let screen = screens
            .into_iter()
            .nth(selector.display_index as usize)
            .ok_or(SourceError::DisplayNotFound {
                display: selector.display_index,
                adapter: selector.adapter_index,
            })?;

        let info = screen.display_info;
        info!(
            "Opened screen #{}: {}x{} @ ({}, {})",
            selector.display_index, info.width, info.height, info.x, info.y
        );

        Ok(ScreenshotsSession {
            screen,
            frame_interval: self.frame_interval,
            next_due: Instant::now(),
            pixels: Vec::new(),
            width: 0,
            height: 0,
        })
    }
}

pub struct ScreenshotsSession {
    screen: Screen,
    frame_interval: Duration,
    next_due: Instant,
    pixels: Vec<u8>,
    width: u32,
    height: u32,
}

impl CaptureSession for ScreenshotsSession {
    fn try_acquire_next_frame(&mut self, timeout: Duration) -> Result<Acquired<'_>, SourceError> {
        let wait = self.next_due.saturating_duration_since(Instant::now());
        if wait > timeout {
            std::thread::sleep(timeout);
            return Ok(Acquired::TimedOut);
        }
        std::thread::sleep(wait);

        let image = self
            .screen
            .capture()
            .map_err(|e| SourceError::AccessLost(e.to_string()))?;
        self.next_due = Instant::now() + self.frame_interval;
        self.width = image.width();
        self.height = image.height();

        let mut pixels = image.into_raw();
        for pixel in pixels.chunks_exact_mut(4) {
            pixel.swap(0, 2);
        }
        self.pixels = pixels;

        Ok(Acquired::Ready(MappedFrame {
            width: self.width,
            height: self.height,
            row_pitch: self.width as usize * PixelFormat::Bgra8.bytes_per_pixel(),
            format: PixelFormat::Bgra8,
            data: &self.pixels,
        }))
    }

    fn release_frame(&mut self) -> Result<(), SourceError> {
        Ok(())
    }

    fn close(&mut self) {
        self.pixels = Vec::new();
        debug!("Closed screen capture session");
    }
}

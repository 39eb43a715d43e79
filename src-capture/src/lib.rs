//! Continuous screen frame capture.
//!
//! A [`CapturePipeline`] pulls frames from a [`FrameSource`] on a capture
//! thread and delivers them to a callback and listeners on a separate
//! callback thread, so slow consumers never stall acquisition. When the
//! consumer falls behind, the oldest queued frames are dropped.
//!
//! ```no_run
//! # fn demo<S: framecap::FrameSource>(source: S) -> Result<(), framecap::CaptureError> {
//! use framecap::{frame_callback, CapturePipeline};
//!
//! let pipeline = CapturePipeline::new(source);
//! pipeline.add_stop_listener(|stopped| {
//!     if let Some(e) = &stopped.error {
//!         eprintln!("capture failed: {e}");
//!     }
//! });
//! pipeline.start_capture(
//!     Some(frame_callback(|frame| {
//!         println!("frame {} ({}x{})", frame.number(), frame.width(), frame.height());
//!         Ok(())
//!     })),
//!     0,
//!     0,
//! )?;
//! // ...
//! pipeline.stop_capture();
//! pipeline.join()
//! # }
//! ```

pub mod capture;
pub mod config;
pub mod pipeline;

pub use capture::{
    Acquired, CallbackError, CaptureError, CaptureSession, DisplaySelector, Frame, FrameSource,
    MappedFrame, PixelFormat, Screenshotter, SourceError,
};
pub use config::{load_config, CaptureConfig, ConfigError};
pub use pipeline::{
    frame_callback, CapturePipeline, CaptureStats, CaptureStopped, FrameProduced, ListenerId,
    Status,
};

#[cfg(feature = "screenshots")]
pub use capture::ScreenshotsSource;

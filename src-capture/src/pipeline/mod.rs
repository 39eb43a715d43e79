//! Continuous capture pipeline.
//!
//! Each cycle runs two threads. The capture thread owns the session, acquires
//! frames and pushes them onto the queue. The callback thread pops them and
//! hands them to the callback and listeners. The capture thread is the sole
//! owner of teardown: it closes the session, joins the callback thread,
//! discards undelivered frames, resets the status and reports the outcome.
//!
//! Queue, error slot, buffer pool and threads are created per cycle and
//! discarded when the status returns to [`Status::Inactive`].

mod consumer;
mod error_slot;
pub mod events;
mod producer;
mod queue;
pub mod stats;
pub mod status;

use crate::capture::{CallbackError, CaptureError, DisplaySelector, Frame, FrameSource};
use crate::config::CaptureConfig;
use crossbeam_channel::{Receiver, Sender};
use error_slot::ErrorSlot;
use queue::FrameQueue;
use stats::CycleMetrics;
use status::AtomicStatus;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

pub use events::{
    CaptureStopped, FrameCallback, FrameListener, FrameProduced, ListenerId, StopListener,
};
pub use stats::CaptureStats;
pub use status::Status;

use events::Listeners;

/// Box a closure as a [`FrameCallback`].
pub fn frame_callback<F>(callback: F) -> FrameCallback
where
    F: FnMut(&Frame) -> Result<(), CallbackError> + Send + 'static,
{
    Box::new(callback)
}

/// Behaviour switches, readable and writable at any time.
///
/// Each flag is read at the point where it applies, so a change takes effect
/// on the next frame that reaches that point.
#[derive(Debug)]
pub(crate) struct CaptureFlags {
    skip_first_frame: AtomicBool,
    skip_frames: AtomicBool,
    preserve_buffer: AtomicBool,
}

impl CaptureFlags {
    fn from_config(config: &CaptureConfig) -> Self {
        Self {
            skip_first_frame: AtomicBool::new(config.skip_first_frame),
            skip_frames: AtomicBool::new(config.skip_frames),
            preserve_buffer: AtomicBool::new(config.preserve_buffer),
        }
    }

    pub(crate) fn skip_first_frame(&self) -> bool {
        self.skip_first_frame.load(Ordering::SeqCst)
    }

    pub(crate) fn skip_frames(&self) -> bool {
        self.skip_frames.load(Ordering::SeqCst)
    }

    pub(crate) fn preserve_buffer(&self) -> bool {
        self.preserve_buffer.load(Ordering::SeqCst)
    }
}

/// Poll intervals bounding how long each thread takes to notice a stop.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Timing {
    pub(crate) acquire_timeout: Duration,
    pub(crate) callback_poll: Duration,
}

/// State living as long as the pipeline.
pub(crate) struct Shared {
    pub(crate) status: AtomicStatus,
    pub(crate) flags: CaptureFlags,
    pub(crate) timing: Timing,
    pub(crate) frame_listeners: Listeners<FrameListener>,
    pub(crate) stop_listeners: Listeners<StopListener>,
    preserved_tx: Mutex<Option<Sender<Frame>>>,
    max_pooled_buffers: usize,
    closing: AtomicBool,
    current: Mutex<Option<Arc<Cycle>>>,
    last_metrics: RwLock<Arc<CycleMetrics>>,
}

impl Shared {
    fn new(config: &CaptureConfig) -> Self {
        Self {
            status: AtomicStatus::new(),
            flags: CaptureFlags::from_config(config),
            timing: Timing {
                acquire_timeout: config.acquire_timeout(),
                callback_poll: config.callback_poll(),
            },
            frame_listeners: Listeners::new(),
            stop_listeners: Listeners::new(),
            preserved_tx: Mutex::new(None),
            max_pooled_buffers: config.max_pooled_buffers,
            closing: AtomicBool::new(false),
            current: Mutex::new(None),
            last_metrics: RwLock::new(Arc::new(CycleMetrics::new(0))),
        }
    }

    /// Pass a delivered frame to the holder of [`CapturePipeline::preserved_frames`].
    ///
    /// Gives the frame back when nobody holds a receiver.
    pub(crate) fn hand_over(&self, frame: Frame) -> Result<(), Frame> {
        let mut slot = self.preserved_tx.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(tx) = slot.as_ref() else {
            return Err(frame);
        };
        match tx.send(frame) {
            Ok(()) => Ok(()),
            Err(e) => {
                // Receiver dropped; stop offering frames until a new one is taken.
                slot.take();
                Err(e.into_inner())
            }
        }
    }

    pub(crate) fn is_closing(&self) -> bool {
        self.closing.load(Ordering::SeqCst)
    }

    fn begin_cycle(&self, cycle: &Arc<Cycle>) {
        *self.last_metrics.write().unwrap_or_else(PoisonError::into_inner) =
            Arc::clone(&cycle.metrics);
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(cycle));
    }

    /// Forget the cycle and return to `Inactive`.
    pub(crate) fn end_cycle(&self) {
        self.current.lock().unwrap_or_else(PoisonError::into_inner).take();
        self.status.begin_stopping();
        self.status.advance(Status::Stopping, Status::Inactive);
    }

    fn current_cycle(&self) -> Option<Arc<Cycle>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

/// State of one start/stop cycle, shared by its two threads.
pub(crate) struct Cycle {
    pub(crate) selector: DisplaySelector,
    pub(crate) queue: FrameQueue,
    pub(crate) errors: ErrorSlot,
    pub(crate) metrics: Arc<CycleMetrics>,
    consumer: Mutex<Option<JoinHandle<()>>>,
}

impl Cycle {
    fn new(selector: DisplaySelector, max_pooled_buffers: usize) -> Self {
        Self {
            selector,
            queue: FrameQueue::new(),
            errors: ErrorSlot::default(),
            metrics: Arc::new(CycleMetrics::new(max_pooled_buffers)),
            consumer: Mutex::new(None),
        }
    }

    fn set_consumer(&self, handle: JoinHandle<()>) {
        *self.consumer.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    pub(crate) fn take_consumer(&self) -> Option<JoinHandle<()>> {
        self.consumer.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

/// Captures frames from a [`FrameSource`] and delivers them on a separate
/// thread.
///
/// `start_capture` and `stop_capture` never block; they are ignored when the
/// pipeline is not in the state they apply to. Completion of a cycle is
/// reported to the stop listeners, or through [`join`](Self::join).
pub struct CapturePipeline<S: FrameSource> {
    source: Arc<S>,
    shared: Arc<Shared>,
    producer: Mutex<Option<JoinHandle<Result<(), CaptureError>>>>,
}

impl<S: FrameSource> CapturePipeline<S> {
    /// Create a pipeline with the default configuration.
    pub fn new(source: S) -> Self {
        Self::with_config(source, &CaptureConfig::default())
    }

    pub fn with_config(source: S, config: &CaptureConfig) -> Self {
        Self {
            source: Arc::new(source),
            shared: Arc::new(Shared::new(config)),
            producer: Mutex::new(None),
        }
    }

    /// Start capturing display `display_index` of adapter `adapter_index`
    /// without a direct callback.
    pub fn start(&self, display_index: u32, adapter_index: u32) -> Result<bool, CaptureError> {
        self.start_capture(None, display_index, adapter_index)
    }

    /// Start a capture cycle.
    ///
    /// Returns `Ok(false)` without doing anything unless the pipeline is
    /// inactive. Otherwise spawns the capture and callback threads and returns
    /// `Ok(true)` immediately; opening the session happens on the capture
    /// thread.
    pub fn start_capture(
        &self,
        callback: Option<FrameCallback>,
        display_index: u32,
        adapter_index: u32,
    ) -> Result<bool, CaptureError> {
        if self.shared.is_closing()
            || !self.shared.status.advance(Status::Inactive, Status::Starting)
        {
            debug!("Start ignored while {:?}", self.status());
            return Ok(false);
        }

        let selector = DisplaySelector::new(display_index, adapter_index);
        let cycle = Arc::new(Cycle::new(selector, self.shared.max_pooled_buffers));
        self.shared.begin_cycle(&cycle);

        let spawned = {
            let shared = Arc::clone(&self.shared);
            let cycle = Arc::clone(&cycle);
            thread::Builder::new()
                .name("framecap-callback".into())
                .spawn(move || consumer::run_callbacks(&shared, &cycle, callback))
        };
        match spawned {
            Ok(handle) => cycle.set_consumer(handle),
            Err(e) => {
                self.shared.end_cycle();
                return Err(CaptureError::Spawn(e));
            }
        }

        let spawned = {
            let source = Arc::clone(&self.source);
            let shared = Arc::clone(&self.shared);
            let cycle = Arc::clone(&cycle);
            thread::Builder::new()
                .name("framecap-capture".into())
                .spawn(move || producer::run_capture(source.as_ref(), &shared, &cycle))
        };
        match spawned {
            Ok(handle) => {
                self.store_producer(handle);
                info!("Capture starting for {}", selector);
                Ok(true)
            }
            Err(e) => {
                self.shared.status.begin_stopping();
                if let Some(consumer) = cycle.take_consumer() {
                    let _ = consumer.join();
                }
                self.shared.end_cycle();
                Err(CaptureError::Spawn(e))
            }
        }
    }

    fn store_producer(&self, handle: JoinHandle<Result<(), CaptureError>>) {
        let previous = self
            .producer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);

        // An earlier cycle nobody joined; surface its outcome in the log.
        if let Some(previous) = previous.filter(|h| h.is_finished()) {
            if let Ok(Err(e)) = previous.join() {
                warn!("Previous capture cycle ended with an unobserved error: {}", e);
            }
        }
    }

    /// Request the active cycle to stop. Returns whether the request was
    /// accepted; it is ignored unless the pipeline is `Active`.
    pub fn stop_capture(&self) -> bool {
        let accepted = self.shared.status.advance(Status::Active, Status::Stopping);
        if accepted {
            info!("Capture stop requested");
        }
        accepted
    }

    /// Wait for the most recently started cycle to finish and return its
    /// outcome.
    ///
    /// The outcome is `Err` when the cycle failed and no stop listener was
    /// registered to receive the failure. Returns `Ok(())` immediately when
    /// there is nothing to wait for or when called from the capture thread
    /// itself (e.g. inside a stop listener).
    pub fn join(&self) -> Result<(), CaptureError> {
        let mut slot = self.producer.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(handle) = slot.take() else {
            return Ok(());
        };
        if handle.thread().id() == thread::current().id() {
            *slot = Some(handle);
            return Ok(());
        }
        drop(slot);

        match handle.join() {
            Ok(outcome) => outcome,
            Err(_) => Err(CaptureError::ThreadPanicked("capture")),
        }
    }

    pub fn status(&self) -> Status {
        self.shared.status.load()
    }

    /// True from the start request until teardown has completed.
    pub fn is_active(&self) -> bool {
        self.status() != Status::Inactive
    }

    pub fn is_inactive(&self) -> bool {
        self.status() == Status::Inactive
    }

    /// Discard the first frame of every session (it may show stale content).
    pub fn set_skip_first_frame(&self, enabled: bool) {
        self.shared.flags.skip_first_frame.store(enabled, Ordering::SeqCst);
    }

    pub fn skip_first_frame(&self) -> bool {
        self.shared.flags.skip_first_frame()
    }

    /// Drop the oldest queued frames when the callbacks fall behind, keeping
    /// memory bounded at the cost of losing frames.
    pub fn set_skip_frames(&self, enabled: bool) {
        self.shared.flags.skip_frames.store(enabled, Ordering::SeqCst);
    }

    pub fn skip_frames(&self) -> bool {
        self.shared.flags.skip_frames()
    }

    /// Hand delivered frames to [`preserved_frames`](Self::preserved_frames)
    /// instead of disposing them after the callbacks return.
    pub fn set_preserve_buffer(&self, enabled: bool) {
        self.shared.flags.preserve_buffer.store(enabled, Ordering::SeqCst);
    }

    pub fn preserve_buffer(&self) -> bool {
        self.shared.flags.preserve_buffer()
    }

    /// Register a listener for delivered frames. Listeners run on the
    /// callback thread, in registration order, after the direct callback.
    pub fn add_frame_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&FrameProduced<'_>) -> Result<(), CallbackError> + Send + Sync + 'static,
    {
        self.shared.frame_listeners.add(Arc::new(listener))
    }

    pub fn remove_frame_listener(&self, id: ListenerId) -> bool {
        self.shared.frame_listeners.remove(id)
    }

    /// Register a listener for the end of each cycle. It runs on the capture
    /// thread once the pipeline is already `Inactive`.
    pub fn add_stop_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&CaptureStopped) + Send + Sync + 'static,
    {
        self.shared.stop_listeners.add(Arc::new(listener))
    }

    pub fn remove_stop_listener(&self, id: ListenerId) -> bool {
        self.shared.stop_listeners.remove(id)
    }

    /// Take ownership of the frames delivered while buffer preservation is
    /// enabled.
    ///
    /// The pipeline keeps only the sending side: frames sit in the returned
    /// receiver until its holder drops them, and a new call replaces the
    /// previous receiver. Without a live receiver, preserved frames are
    /// disposed after the callbacks as usual.
    pub fn preserved_frames(&self) -> Receiver<Frame> {
        let (tx, rx) = crossbeam_channel::unbounded();
        *self
            .shared
            .preserved_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(tx);
        rx
    }

    /// Frames currently waiting for the callback thread.
    pub fn queue_len(&self) -> usize {
        self.shared
            .current_cycle()
            .map_or(0, |cycle| cycle.queue.len())
    }

    /// Accounting of the current or most recent cycle.
    pub fn stats(&self) -> CaptureStats {
        self.shared
            .last_metrics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot()
    }
}

impl<S: FrameSource> Drop for CapturePipeline<S> {
    fn drop(&mut self) {
        self.shared.closing.store(true, Ordering::SeqCst);
        self.stop_capture();
        if let Err(e) = self.join() {
            warn!("Capture ended with an error during shutdown: {}", e);
        }
    }
}

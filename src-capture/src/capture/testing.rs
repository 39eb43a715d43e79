//! Scripted frame source for tests.
//!
//! Frames are only produced when the test hands out a permit through the
//! [`SourceController`], which makes producer timing deterministic.

use super::{Acquired, CaptureSession, DisplaySelector, FrameSource, MappedFrame, PixelFormat, SourceError};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub(crate) const FRAME_WIDTH: u32 = 4;
pub(crate) const FRAME_HEIGHT: u32 = 2;
/// Padded rows: 16 pixel bytes + 4 padding bytes.
pub(crate) const ROW_PITCH: usize = 20;

enum Step {
    Frame,
    Fail(String),
    Panic(String),
}

/// How `open` misbehaves.
enum OpenFault {
    Fail(String),
    Panic(String),
}

/// Counters shared between a scripted source, its sessions and the test.
#[derive(Default)]
pub(crate) struct SourceProbes {
    opened: AtomicUsize,
    closed: AtomicUsize,
    acquired: AtomicUsize,
    released: AtomicUsize,
}

impl SourceProbes {
    pub(crate) fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub(crate) fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub(crate) fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

pub(crate) struct ScriptedSource {
    steps: Receiver<Step>,
    probes: Arc<SourceProbes>,
    open_fault: Option<OpenFault>,
    open_gate: Option<Receiver<()>>,
}

impl ScriptedSource {
    /// A source whose `open` always fails.
    pub(crate) fn failing_open(message: &str) -> (Self, SourceController) {
        let (mut source, controller) = scripted();
        source.open_fault = Some(OpenFault::Fail(message.to_string()));
        (source, controller)
    }

    /// A source whose `open` panics.
    pub(crate) fn panicking_open(message: &str) -> (Self, SourceController) {
        let (mut source, controller) = scripted();
        source.open_fault = Some(OpenFault::Panic(message.to_string()));
        (source, controller)
    }

    /// Make every `open` wait for a unit on the returned sender, holding the
    /// pipeline in `Starting`.
    pub(crate) fn gate_open(&mut self) -> Sender<()> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.open_gate = Some(rx);
        tx
    }
}

/// Test-side handle driving a [`ScriptedSource`].
pub(crate) struct SourceController {
    steps: Sender<Step>,
    pub(crate) probes: Arc<SourceProbes>,
}

impl SourceController {
    /// Allow the session to produce `count` more frames.
    pub(crate) fn emit(&self, count: usize) {
        for _ in 0..count {
            let _ = self.steps.send(Step::Frame);
        }
    }

    /// Make the next acquire fail with `message`.
    pub(crate) fn fail(&self, message: &str) {
        let _ = self.steps.send(Step::Fail(message.to_string()));
    }

    /// Make the next acquire panic with `message`.
    pub(crate) fn panic_next(&self, message: &str) {
        let _ = self.steps.send(Step::Panic(message.to_string()));
    }
}

pub(crate) fn scripted() -> (ScriptedSource, SourceController) {
    let (tx, rx) = crossbeam_channel::unbounded();
    let probes = Arc::new(SourceProbes::default());
    (
        ScriptedSource {
            steps: rx,
            probes: Arc::clone(&probes),
            open_fault: None,
            open_gate: None,
        },
        SourceController { steps: tx, probes },
    )
}

impl FrameSource for ScriptedSource {
    type Session = ScriptedSession;

    fn open(&self, selector: DisplaySelector) -> Result<ScriptedSession, SourceError> {
        if let Some(gate) = &self.open_gate {
            let _ = gate.recv_timeout(Duration::from_secs(5));
        }
        match &self.open_fault {
            Some(OpenFault::Fail(message)) => return Err(SourceError::other(message.clone())),
            Some(OpenFault::Panic(message)) => panic!("{}", message),
            None => {}
        }
        if selector.adapter_index != 0 {
            return Err(SourceError::AdapterNotFound(selector.adapter_index));
        }
        self.probes.opened.fetch_add(1, Ordering::SeqCst);
        Ok(ScriptedSession {
            steps: self.steps.clone(),
            probes: Arc::clone(&self.probes),
            pixels: vec![0; ROW_PITCH * FRAME_HEIGHT as usize],
            produced: 0,
            holding: false,
        })
    }
}

pub(crate) struct ScriptedSession {
    steps: Receiver<Step>,
    probes: Arc<SourceProbes>,
    pixels: Vec<u8>,
    produced: u8,
    holding: bool,
}

impl CaptureSession for ScriptedSession {
    fn try_acquire_next_frame(&mut self, timeout: Duration) -> Result<Acquired<'_>, SourceError> {
        assert!(!self.holding, "acquire while the previous frame is still held");

        match self.steps.recv_timeout(timeout) {
            Ok(Step::Frame) => {
                self.produced = self.produced.wrapping_add(1);
                self.pixels.fill(self.produced);
                self.holding = true;
                self.probes.acquired.fetch_add(1, Ordering::SeqCst);
                Ok(Acquired::Ready(MappedFrame {
                    width: FRAME_WIDTH,
                    height: FRAME_HEIGHT,
                    row_pitch: ROW_PITCH,
                    format: PixelFormat::Bgra8,
                    data: &self.pixels,
                }))
            }
            Ok(Step::Fail(message)) => Err(SourceError::AccessLost(message)),
            Ok(Step::Panic(message)) => panic!("{}", message),
            Err(RecvTimeoutError::Timeout) => Ok(Acquired::TimedOut),
            Err(RecvTimeoutError::Disconnected) => {
                std::thread::sleep(timeout);
                Ok(Acquired::TimedOut)
            }
        }
    }

    fn release_frame(&mut self) -> Result<(), SourceError> {
        assert!(self.holding, "release without an acquired frame");
        self.holding = false;
        self.probes.released.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn close(&mut self) {
        self.probes.closed.fetch_add(1, Ordering::SeqCst);
    }
}

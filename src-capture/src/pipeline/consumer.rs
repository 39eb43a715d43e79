//! Callback thread: frame delivery.

use super::error_slot::ErrorOrigin;
use super::events::{FrameCallback, FrameProduced};
use super::stats::bump;
use super::{Cycle, Shared};
use crate::capture::error::panic_message;
use crate::capture::{CallbackError, CaptureError, DisplaySelector, Frame};
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, trace, warn};

/// Body of the callback thread.
///
/// Runs while the status is `Starting` or `Active`. Frames still queued once
/// the status moves on are left for teardown to discard.
pub(crate) fn run_callbacks(shared: &Shared, cycle: &Cycle, mut callback: Option<FrameCallback>) {
    debug!("Callback thread started for {}", cycle.selector);

    while shared.status.load().is_running() {
        let Some(frame) = cycle.queue.pop_timeout(shared.timing.callback_poll) else {
            continue;
        };
        if let Err(e) = deliver(shared, cycle, callback.as_mut(), frame) {
            warn!("Frame delivery failed: {}", e);
            cycle.errors.record(ErrorOrigin::Callback, e);
            break;
        }
    }

    debug!("Callback thread exiting");
}

/// Run the callback and listeners for one frame, then dispose of the frame or
/// hand it over when buffers are preserved.
fn deliver(
    shared: &Shared,
    cycle: &Cycle,
    callback: Option<&mut FrameCallback>,
    frame: Frame,
) -> Result<(), CaptureError> {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        notify(shared, cycle.selector, callback, &frame)
    }));

    let counters = &cycle.metrics.counters;
    if shared.flags.preserve_buffer() {
        match shared.hand_over(frame) {
            Ok(()) => bump(&counters.preserved, 1),
            Err(unclaimed) => {
                trace!("No receiver for preserved frame {}, disposing", unclaimed.number());
                drop(unclaimed);
            }
        }
    } else {
        drop(frame);
    }

    match outcome {
        Ok(Ok(())) => {
            bump(&counters.delivered, 1);
            Ok(())
        }
        Ok(Err(e)) => Err(CaptureError::CallbackFailed(e)),
        Err(payload) => Err(CaptureError::CallbackPanicked(panic_message(payload.as_ref()))),
    }
}

fn notify(
    shared: &Shared,
    selector: DisplaySelector,
    callback: Option<&mut FrameCallback>,
    frame: &Frame,
) -> Result<(), CallbackError> {
    if let Some(callback) = callback {
        callback(frame)?;
    }

    let event = FrameProduced { frame, selector };
    for listener in shared.frame_listeners.snapshot() {
        listener(&event)?;
    }
    Ok(())
}

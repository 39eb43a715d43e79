//! Capture thread: acquire loop and cycle teardown.

use super::error_slot::ErrorOrigin;
use super::events::CaptureStopped;
use super::stats::{bump, CaptureStats};
use super::{Cycle, Shared, Status};
use crate::capture::error::panic_message;
use crate::capture::{acquire_frame, CaptureError, CaptureSession, DisplaySelector, FrameSource};
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, error, info, trace, warn};

/// Body of the capture thread.
///
/// Every call into the source runs under a panic guard so that teardown
/// always runs. Returns the cycle's failure when no stop listener was there
/// to take it.
pub(crate) fn run_capture<S: FrameSource>(
    source: &S,
    shared: &Shared,
    cycle: &Cycle,
) -> Result<(), CaptureError> {
    let selector = cycle.selector;

    match guarded(|| source.open(selector)) {
        Ok(Ok(mut session)) => {
            if shared.status.advance(Status::Starting, Status::Active) {
                info!("Capturing {}", selector);
                if let Err(message) = guarded(|| acquire_loop(&mut session, shared, cycle)) {
                    record_panic(cycle, message);
                }
            }
            match guarded(|| session.close()) {
                Ok(()) => debug!("Closed capture session for {}", selector),
                Err(message) => record_panic(cycle, message),
            }
        }
        Ok(Err(e)) => {
            warn!("Failed to open {}: {}", selector, e);
            cycle.errors.record(
                ErrorOrigin::Capture,
                CaptureError::SourceUnavailable {
                    display: selector.display_index,
                    adapter: selector.adapter_index,
                    source: e,
                },
            );
        }
        Err(message) => record_panic(cycle, message),
    }

    teardown(shared, cycle)
}

fn guarded<T>(f: impl FnOnce() -> T) -> Result<T, String> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| panic_message(payload.as_ref()))
}

fn record_panic(cycle: &Cycle, message: String) {
    error!("Capture source for {} panicked: {}", cycle.selector, message);
    cycle
        .errors
        .record(ErrorOrigin::Capture, CaptureError::SourcePanicked(message));
}

fn acquire_loop<C: CaptureSession>(session: &mut C, shared: &Shared, cycle: &Cycle) {
    let counters = &cycle.metrics.counters;
    let mut frame_number = 0u64;

    while shared.status.load() == Status::Active
        && !cycle.errors.is_set()
        && !shared.is_closing()
    {
        let acquired = acquire_frame(
            session,
            shared.timing.acquire_timeout,
            frame_number + 1,
            &cycle.metrics.pool,
        );
        let frame = match acquired {
            Ok(Some(frame)) => frame,
            Ok(None) => continue,
            Err(e) => {
                error!("Capture of {} failed: {}", cycle.selector, e);
                cycle.errors.record(ErrorOrigin::Capture, e);
                break;
            }
        };
        frame_number += 1;
        bump(&counters.acquired, 1);

        if shared.flags.skip_frames() {
            let dropped = cycle.queue.drop_oldest(1);
            if dropped > 0 {
                bump(&counters.dropped, dropped as u64);
                trace!("Dropped {} stale frame(s) before frame {}", dropped, frame_number);
            }
        }

        if frame_number == 1 && shared.flags.skip_first_frame() {
            bump(&counters.skipped_first, 1);
            trace!("Skipping first frame of the session");
            continue;
        }

        cycle.queue.push(frame);
    }
}

/// Stop the callback thread, discard what is left and return to `Inactive`,
/// then report the outcome.
fn teardown(shared: &Shared, cycle: &Cycle) -> Result<(), CaptureError> {
    shared.status.begin_stopping();

    if let Some(consumer) = cycle.take_consumer() {
        if consumer.join().is_err() {
            cycle
                .errors
                .record(ErrorOrigin::Callback, CaptureError::ThreadPanicked("callback"));
        }
    }

    let discarded = cycle.queue.drain();
    if discarded > 0 {
        bump(&cycle.metrics.counters.discarded_on_stop, discarded as u64);
        debug!("Discarded {} undelivered frame(s)", discarded);
    }

    let failure = cycle.errors.take();
    let stats = cycle.metrics.snapshot();
    shared.end_cycle();

    let error = failure.map(|(origin, e)| {
        info!("Capture of {} stopped after a {} failure", cycle.selector, origin);
        e
    });
    if error.is_none() {
        info!(
            "Capture of {} stopped: {} frame(s) delivered, {} dropped",
            cycle.selector, stats.frames_delivered, stats.frames_dropped
        );
    }

    report(shared, cycle.selector, error, stats)
}

fn report(
    shared: &Shared,
    selector: DisplaySelector,
    error: Option<CaptureError>,
    stats: CaptureStats,
) -> Result<(), CaptureError> {
    let listeners = shared.stop_listeners.snapshot();
    if listeners.is_empty() {
        return match error {
            Some(e) => {
                error!("Capture of {} failed with no stop listener: {}", selector, e);
                Err(e)
            }
            None => Ok(()),
        };
    }

    let event = CaptureStopped {
        selector,
        error,
        stats,
    };
    for listener in listeners {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| listener(&event))) {
            error!("Stop listener panicked: {}", panic_message(payload.as_ref()));
        }
    }
    Ok(())
}

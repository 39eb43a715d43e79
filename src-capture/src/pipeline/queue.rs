//! Frame queue between the capture thread and the callback thread.
//!
//! An unbounded crossbeam channel serves as both the FIFO and the wake signal:
//! a send is the enqueue plus the signal, and a receive with timeout is the
//! bounded wait plus the dequeue, so coalesced wake-ups cannot strand frames.
//! The capture thread keeps its own receiver to discard the oldest frames.

use crate::capture::Frame;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

#[derive(Clone)]
pub(crate) struct FrameQueue {
    tx: Sender<Frame>,
    rx: Receiver<Frame>,
}

impl FrameQueue {
    pub(crate) fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self { tx, rx }
    }

    /// Enqueue a frame and wake the consumer.
    pub(crate) fn push(&self, frame: Frame) {
        // Cannot fail: this queue holds a receiver for as long as it holds the sender.
        let _ = self.tx.send(frame);
    }

    /// Wait up to `timeout` for the next frame.
    pub(crate) fn pop_timeout(&self, timeout: Duration) -> Option<Frame> {
        match self.rx.recv_timeout(timeout) {
            Ok(frame) => Some(frame),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.rx.len()
    }

    /// Discard the oldest frames until at most `keep` remain. Returns the
    /// number of frames discarded.
    pub(crate) fn drop_oldest(&self, keep: usize) -> usize {
        let mut dropped = 0;
        while self.rx.len() > keep {
            match self.rx.try_recv() {
                Ok(frame) => {
                    drop(frame);
                    dropped += 1;
                }
                // The consumer emptied the queue concurrently.
                Err(_) => break,
            }
        }
        dropped
    }

    /// Discard every queued frame. Returns the number discarded.
    pub(crate) fn drain(&self) -> usize {
        self.rx.try_iter().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::PixelFormat;

    /// 1x1 frame tagged through its pixel value.
    fn frame(tag: u8) -> Frame {
        Frame::from_pixels(1, 1, PixelFormat::Bgra8, vec![tag; 4]).unwrap()
    }

    #[test]
    fn test_fifo_order() {
        let queue = FrameQueue::new();
        queue.push(frame(1));
        queue.push(frame(2));

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop_timeout(Duration::from_millis(1)).unwrap().data()[0], 1);
        assert_eq!(queue.pop_timeout(Duration::from_millis(1)).unwrap().data()[0], 2);
        assert!(queue.pop_timeout(Duration::from_millis(1)).is_none());
    }

    #[test]
    fn test_drop_oldest_keeps_newest() {
        let queue = FrameQueue::new();
        for n in 1..=5 {
            queue.push(frame(n));
        }

        assert_eq!(queue.drop_oldest(1), 4);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop_timeout(Duration::from_millis(1)).unwrap().data()[0], 5);
    }

    #[test]
    fn test_drop_oldest_noop_when_short() {
        let queue = FrameQueue::new();
        queue.push(frame(1));
        assert_eq!(queue.drop_oldest(1), 0);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_drain_empties_queue() {
        let queue = FrameQueue::new();
        for n in 1..=3 {
            queue.push(frame(n));
        }
        assert_eq!(queue.drain(), 3);
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn test_clones_share_the_queue() {
        let producer = FrameQueue::new();
        let consumer = producer.clone();
        producer.push(frame(9));
        assert_eq!(consumer.len(), 1);
        assert_eq!(consumer.pop_timeout(Duration::from_millis(1)).unwrap().data()[0], 9);
    }
}

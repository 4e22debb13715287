//! Single-slot hand-off between the capture worker and its consumer.
//!
//! The slot holds at most one frame. Publishing a new frame before the previous
//! one was taken replaces it: consumers that fall behind only ever see the latest
//! frame. Publishing never waits for the consumer.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::error::Error;
use crate::frame::Frame;

#[derive(Default)]
struct Slot {
    frame: Option<Frame>,
    finished: bool,
    error: Option<Error>,
    published: u64,
    dropped: u64,
}

#[derive(Default)]
struct Shared {
    slot: Mutex<Slot>,
    ready: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Slot> {
        // a panicking publisher leaves the slot in a consistent state
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Creates a connected publisher and receiver
pub fn slot() -> (Publisher, Frames) {
    let shared = Arc::new(Shared::default());
    (
        Publisher {
            shared: Arc::clone(&shared),
        },
        Frames { shared },
    )
}

/// Producer side, owned by the capture worker
pub struct Publisher {
    shared: Arc<Shared>,
}

impl Publisher {
    /// Stores a frame, replacing an unconsumed one
    ///
    /// Returns `true` if an older frame was dropped.
    pub fn publish(&self, frame: Frame) -> bool {
        let dropped = {
            let mut slot = self.shared.lock();
            let dropped = slot.frame.replace(frame).is_some();
            slot.published += 1;
            if dropped {
                slot.dropped += 1;
            }
            dropped
        };
        self.shared.ready.notify_all();
        dropped
    }

    /// Ends the frame sequence, optionally with the error that stopped it
    pub fn finish(self, error: Option<Error>) {
        self.end(error);
    }

    fn end(&self, error: Option<Error>) {
        {
            let mut slot = self.shared.lock();
            if slot.finished {
                return;
            }
            slot.finished = true;
            slot.error = error;
        }
        self.shared.ready.notify_all();
    }
}

impl Drop for Publisher {
    fn drop(&mut self) {
        // consumers must never wait on a worker that is gone
        self.end(None);
    }
}

/// Consumer side: the sequence of captured frames
///
/// Once the stream has ended, a still pending frame is delivered first, then [`Frames::recv`]
/// returns `None` and [`Frames::take_error`] tells whether the stream failed.
pub struct Frames {
    shared: Arc<Shared>,
}

impl Frames {
    /// Blocks until a frame is available or the stream has ended
    pub fn recv(&self) -> Option<Frame> {
        let mut slot = self.shared.lock();
        loop {
            if let Some(frame) = slot.frame.take() {
                return Some(frame);
            }
            if slot.finished {
                return None;
            }
            slot = self
                .shared
                .ready
                .wait(slot)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }

    /// Like [`Frames::recv`], but gives up after `timeout`
    pub fn recv_timeout(&self, timeout: Duration) -> Option<Frame> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.shared.lock();
        loop {
            if let Some(frame) = slot.frame.take() {
                return Some(frame);
            }
            let now = Instant::now();
            if slot.finished || now >= deadline {
                return None;
            }
            slot = self
                .shared
                .ready
                .wait_timeout(slot, deadline - now)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|poisoned| poisoned.into_inner().0);
        }
    }

    /// Takes the pending frame, if any, without blocking
    pub fn try_recv(&self) -> Option<Frame> {
        self.shared.lock().frame.take()
    }

    /// Whether the producer has ended the sequence
    pub fn is_finished(&self) -> bool {
        self.shared.lock().finished
    }

    /// Takes the error that ended the stream
    ///
    /// `None` while the stream is running, and after an orderly close.
    pub fn take_error(&self) -> Option<Error> {
        self.shared.lock().error.take()
    }

    /// Number of frames published so far
    pub fn published(&self) -> u64 {
        self.shared.lock().published
    }

    /// Number of frames replaced before they were received
    pub fn dropped(&self) -> u64 {
        self.shared.lock().dropped
    }
}

impl Iterator for Frames {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        self.recv()
    }
}

//! Blocking FIFO between the producer and consumer threads.

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

use crate::AudioFrame;

/// An item on the transfer queue.
#[derive(Debug)]
pub(crate) enum QueueItem {
    /// Audio for one line.
    Frame(AudioFrame),
    /// No more frames will follow.
    EndOfStream,
}

struct QueueState {
    items: VecDeque<QueueItem>,
    closed: bool,
}

/// An ordered, optionally bounded, blocking queue of frames.
///
/// Exactly one producer pushes and one consumer receives. Cancellation uses
/// [`drain_and_close`](Self::drain_and_close): pending frames are
/// discarded, a single end-of-stream marker is left for the consumer, and
/// later pushes are refused so nothing accumulates after the run is over.
pub(crate) struct TransferQueue {
    state: Mutex<QueueState>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: Option<usize>,
}

impl TransferQueue {
    /// Creates a queue; `None` means unbounded.
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity: capacity.map(|c| c.max(1)),
        }
    }

    /// Appends a frame, blocking while a bounded queue is full.
    ///
    /// Returns `false` if the queue was closed and the frame discarded.
    pub fn push_frame(&self, frame: AudioFrame) -> bool {
        self.push(QueueItem::Frame(frame))
    }

    /// Appends the end-of-stream marker.
    ///
    /// Ignored once the queue is closed, since closing leaves its own marker.
    pub fn push_end(&self) {
        self.push(QueueItem::EndOfStream);
    }

    fn push(&self, item: QueueItem) -> bool {
        let mut state = self.state.lock();
        while !state.closed && self.is_full(&state) {
            self.not_full.wait(&mut state);
        }
        if state.closed {
            return false;
        }
        state.items.push_back(item);
        self.not_empty.notify_one();
        true
    }

    fn is_full(&self, state: &QueueState) -> bool {
        self.capacity
            .is_some_and(|capacity| state.items.len() >= capacity)
    }

    /// Removes the oldest item, blocking until one is available.
    pub fn recv(&self) -> QueueItem {
        let mut state = self.state.lock();
        loop {
            if let Some(item) = state.items.pop_front() {
                self.not_full.notify_one();
                return item;
            }
            self.not_empty.wait(&mut state);
        }
    }

    /// Discards pending items, leaves one end-of-stream marker, and
    /// refuses further pushes.
    ///
    /// Returns the number of frames discarded. Wakes both a consumer
    /// parked on an empty queue and a producer parked on a full one.
    pub fn drain_and_close(&self) -> usize {
        let mut state = self.state.lock();
        let discarded = Self::discard_frames(&mut state);
        state.items.push_back(QueueItem::EndOfStream);
        state.closed = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
        discarded
    }

    /// Discards everything and refuses further pushes, without leaving a marker.
    ///
    /// Used once the consumer has stopped receiving.
    pub fn close(&self) -> usize {
        let mut state = self.state.lock();
        let discarded = Self::discard_frames(&mut state);
        state.closed = true;
        self.not_full.notify_all();
        discarded
    }

    fn discard_frames(state: &mut QueueState) -> usize {
        let frames = state
            .items
            .iter()
            .filter(|item| matches!(item, QueueItem::Frame(_)))
            .count();
        state.items.clear();
        frames
    }

    /// Returns the number of queued items, markers included.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    /// Returns `true` if no items are queued.
    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

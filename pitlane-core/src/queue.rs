//! Bounded per-category FIFO between the dispatcher and one writer.
//!
//! Enqueue never blocks: when the queue is full the oldest item is evicted to
//! admit the newest, so a slow writer costs completeness, not ingestion.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use tracing::trace;

use crate::error::CoreError;

/// Outcome of a successful enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    Accepted,
    /// The oldest queued item was dropped to make room.
    DisplacedOldest,
}

pub struct CategoryQueue<T> {
    name: &'static str,
    sender: Sender<T>,
    // Held by the queue itself so the producer can evict from the front.
    receiver: Receiver<T>,
    capacity: usize,
    displaced: AtomicU64,
}

impl<T> CategoryQueue<T> {
    pub fn with_capacity(name: &'static str, capacity: usize) -> Result<Self, CoreError> {
        if capacity == 0 {
            return Err(CoreError::InvalidCapacity(capacity));
        }
        let (sender, receiver) = bounded(capacity);
        Ok(Self {
            name,
            sender,
            receiver,
            capacity,
            displaced: AtomicU64::new(0),
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Drop-oldest enqueue. Never blocks.
    pub fn enqueue(&self, item: T) -> Result<Enqueued, CoreError> {
        let mut item = item;
        let mut outcome = Enqueued::Accepted;
        loop {
            match self.sender.try_send(item) {
                Ok(()) => return Ok(outcome),
                Err(TrySendError::Full(rejected)) => {
                    // The consumer may have emptied a slot in between; either way
                    // the next attempt has room.
                    if self.receiver.try_recv().is_ok() {
                        self.displaced.fetch_add(1, Ordering::Relaxed);
                        outcome = Enqueued::DisplacedOldest;
                        trace!(queue = self.name, "queue full, displaced oldest item");
                    }
                    item = rejected;
                }
                Err(TrySendError::Disconnected(_)) => {
                    return Err(CoreError::Disconnected(self.name));
                }
            }
        }
    }

    /// Waits up to `timeout` for the next item. `Ok(None)` on timeout.
    pub fn dequeue_timeout(&self, timeout: Duration) -> Result<Option<T>, CoreError> {
        match self.receiver.recv_timeout(timeout) {
            Ok(item) => Ok(Some(item)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(CoreError::Disconnected(self.name)),
        }
    }

    pub fn try_dequeue(&self) -> Option<T> {
        self.receiver.try_recv().ok()
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Items evicted by drop-oldest since creation.
    pub fn displaced(&self) -> u64 {
        self.displaced.load(Ordering::Relaxed)
    }
}

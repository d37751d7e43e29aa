//! Bounded FIFO of owned buffers between exactly one producer stage and one
//! consumer stage.

use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, bounded};

/// Fixed-capacity queue. A failed push hands the item back to the caller,
/// which then owns it again and is expected to drop it.
pub struct FrameQueue<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
    capacity: usize,
}

impl<T> FrameQueue<T> {
    pub fn new(capacity: usize) -> Self {
        // A zero-capacity crossbeam channel is a rendezvous, not a queue.
        let capacity = capacity.max(1);
        let (tx, rx) = bounded(capacity);
        Self { tx, rx, capacity }
    }

    /// Non-blocking push. Returns immediately with the item when full.
    pub fn try_push(&self, item: T) -> Result<(), T> {
        self.tx.try_send(item).map_err(|e| e.into_inner())
    }

    /// Push, waiting at most `timeout` for room.
    pub fn push_timeout(&self, item: T, timeout: Duration) -> Result<(), T> {
        self.tx.send_timeout(item, timeout).map_err(|e| e.into_inner())
    }

    pub fn try_pop(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Pop, waiting at most `timeout` for an item.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<T> {
        self.rx.recv_timeout(timeout).ok()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// True while at least one more item fits.
    pub fn has_headroom(&self) -> bool {
        self.len() < self.capacity
    }

    /// Drop every queued item. Returns how many were released.
    pub fn drain(&self) -> usize {
        let mut released = 0;
        while let Ok(item) = self.rx.try_recv() {
            drop(item);
            released += 1;
        }
        released
    }
}

impl<T> Clone for FrameQueue<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            rx: self.rx.clone(),
            capacity: self.capacity,
        }
    }
}

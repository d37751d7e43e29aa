//! Pre-allocated pools of move-only buffers.
//!
//! A [`Pooled`] handle is the only way to reach a pooled buffer. It cannot
//! be cloned, and dropping it puts the buffer back on the free list, so a
//! buffer has exactly one owner at a time and is released exactly once.

use std::ops::{Deref, DerefMut};

use crossbeam_channel::{Receiver, Sender, bounded};

/// Fixed set of buffers allocated up front and recycled forever.
pub struct BufferPool<T> {
    free_tx: Sender<Box<T>>,
    free_rx: Receiver<Box<T>>,
}

impl<T> BufferPool<T> {
    /// Allocate `size` buffers using `make`.
    pub fn new(size: usize, mut make: impl FnMut() -> T) -> Self {
        let size = size.max(1);
        let (free_tx, free_rx) = bounded(size);
        for _ in 0..size {
            // Channel is sized to hold every buffer.
            let _ = free_tx.try_send(Box::new(make()));
        }
        Self { free_tx, free_rx }
    }

    /// Take a free buffer, or `None` when every buffer is in flight.
    pub fn acquire(&self) -> Option<Pooled<T>> {
        self.free_rx.try_recv().ok().map(|buf| Pooled {
            buf: Some(buf),
            home: self.free_tx.clone(),
        })
    }

    /// Buffers currently on the free list.
    pub fn available(&self) -> usize {
        self.free_rx.len()
    }
}

impl<T> Clone for BufferPool<T> {
    fn clone(&self) -> Self {
        Self {
            free_tx: self.free_tx.clone(),
            free_rx: self.free_rx.clone(),
        }
    }
}

/// Exclusive handle to a pooled buffer.
pub struct Pooled<T> {
    buf: Option<Box<T>>,
    home: Sender<Box<T>>,
}

impl<T> Deref for Pooled<T> {
    type Target = T;

    fn deref(&self) -> &T {
        // Only `Drop` takes the box out.
        self.buf.as_deref().expect("pooled buffer already released")
    }
}

impl<T> DerefMut for Pooled<T> {
    fn deref_mut(&mut self) -> &mut T {
        self.buf.as_deref_mut().expect("pooled buffer already released")
    }
}

impl<T> Drop for Pooled<T> {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            // Fails only if the pool itself is gone; the box is freed then.
            let _ = self.home.try_send(buf);
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Pooled<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Pooled").field(&**self).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_until_exhausted() {
        let pool = BufferPool::new(3, || 0u32);
        let a = pool.acquire().unwrap();
        let b = pool.acquire().unwrap();
        let c = pool.acquire().unwrap();
        assert_eq!(pool.available(), 0);
        assert!(pool.acquire().is_none());

        drop(b);
        assert_eq!(pool.available(), 1);
        assert!(pool.acquire().is_some());
        drop((a, c));
        assert_eq!(pool.available(), 3);
    }

    #[test]
    fn test_buffer_is_reused_not_reallocated() {
        let pool = BufferPool::new(1, || vec![0u8; 4]);
        {
            let mut buf = pool.acquire().unwrap();
            buf[0] = 42;
        }
        let buf = pool.acquire().unwrap();
        assert_eq!(buf[0], 42);
    }

    #[test]
    fn test_release_after_pool_dropped() {
        let pool = BufferPool::new(2, || 1u8);
        let held = pool.acquire().unwrap();
        drop(pool);
        assert_eq!(*held, 1);
        drop(held);
    }
}

/*!
Bounded byte FIFO shared between the guest and host threads.

The emulator carries two of these: the serial input queue (host keyboard
producer, guest $D011 consumer) and the serial output queue (guest $D012 /
monitored-RAM producer, host display consumer). Both sides run on
different threads, so every index update happens under one internal mutex.

Operations never block on empty/full: `enqueue` rejects with `QueueFull`
when at capacity (no overwrite) and `dequeue` returns `None` when empty.
Polling is left to the calling thread; the mutex is only held for the
index update, never across any I/O.
*/

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::{EmuError, Result};

/// Default ring capacity; plenty for interactive terminal pacing.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Thread-safe bounded FIFO of bytes backed by a ring buffer.
///
/// Safe for one producer and one consumer on different threads; all
/// methods take `&self` so the queue can be shared behind an `Arc`.
pub struct ByteQueue {
    inner: Mutex<Ring>,
}

struct Ring {
    buf: Box<[u8]>,
    head: usize,
    tail: usize,
    count: usize,
}

impl Default for ByteQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl ByteQueue {
    /// Create a queue with the default capacity.
    pub fn new() -> Self {
        // DEFAULT_QUEUE_CAPACITY is non-zero, so this cannot fail.
        match Self::with_capacity(DEFAULT_QUEUE_CAPACITY) {
            Ok(q) => q,
            Err(_) => unreachable!("default capacity is non-zero"),
        }
    }

    /// Create a queue holding at most `capacity` bytes. `capacity` must be
    /// at least 1.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(EmuError::InvalidArgument("queue capacity must be > 0"));
        }
        Ok(Self {
            inner: Mutex::new(Ring {
                buf: vec![0u8; capacity].into_boxed_slice(),
                head: 0,
                tail: 0,
                count: 0,
            }),
        })
    }

    fn locked(&self) -> MutexGuard<'_, Ring> {
        // A poisoned queue still holds consistent indices; recover it.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append one byte. Rejects with `QueueFull` when at capacity.
    pub fn enqueue(&self, b: u8) -> Result<()> {
        let mut ring = self.locked();
        if ring.count == ring.buf.len() {
            return Err(EmuError::QueueFull);
        }
        let tail = ring.tail;
        ring.buf[tail] = b;
        ring.tail = (tail + 1) % ring.buf.len();
        ring.count += 1;
        Ok(())
    }

    /// Remove and return the oldest byte, or `None` when empty.
    pub fn dequeue(&self) -> Option<u8> {
        let mut ring = self.locked();
        if ring.count == 0 {
            return None;
        }
        let b = ring.buf[ring.head];
        ring.head = (ring.head + 1) % ring.buf.len();
        ring.count -= 1;
        Some(b)
    }

    /// Discard all queued bytes.
    pub fn clear(&self) {
        let mut ring = self.locked();
        ring.head = 0;
        ring.tail = 0;
        ring.count = 0;
    }

    /// True when no bytes are queued.
    pub fn is_empty(&self) -> bool {
        self.locked().count == 0
    }

    /// Number of bytes currently queued.
    pub fn len(&self) -> usize {
        self.locked().count
    }

    /// Maximum number of bytes the queue can hold.
    pub fn capacity(&self) -> usize {
        self.locked().buf.len()
    }

    /// Enqueue, silently dropping the byte when the queue is full.
    ///
    /// Used on the guest-visible output path: the guest cannot observe
    /// host backpressure on $D012 or the monitored hooks.
    pub(crate) fn enqueue_lossy(&self, b: u8) {
        if self.enqueue(b).is_err() {
            log::warn!("output queue full; dropping byte {b:#04X}");
        }
    }

    /// Enqueue every byte of `bytes`, dropping on overflow.
    pub(crate) fn enqueue_all_lossy(&self, bytes: &[u8]) {
        for &b in bytes {
            self.enqueue_lossy(b);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn fifo_order() {
        let q = ByteQueue::new();
        q.enqueue(1).unwrap();
        q.enqueue(2).unwrap();
        q.enqueue(3).unwrap();
        assert_eq!(q.dequeue(), Some(1));
        assert_eq!(q.dequeue(), Some(2));
        assert_eq!(q.dequeue(), Some(3));
        assert_eq!(q.dequeue(), None);
    }

    #[test]
    fn rejects_when_full() {
        let q = ByteQueue::with_capacity(2).unwrap();
        q.enqueue(0xAA).unwrap();
        q.enqueue(0xBB).unwrap();
        assert!(matches!(q.enqueue(0xCC), Err(EmuError::QueueFull)));
        // The stored bytes are untouched by the rejected enqueue.
        assert_eq!(q.dequeue(), Some(0xAA));
        assert_eq!(q.dequeue(), Some(0xBB));
    }

    #[test]
    fn zero_capacity_rejected() {
        assert!(ByteQueue::with_capacity(0).is_err());
    }

    #[test]
    fn wraps_around_capacity() {
        let q = ByteQueue::with_capacity(4).unwrap();
        for round in 0..10u8 {
            q.enqueue(round).unwrap();
            assert_eq!(q.dequeue(), Some(round));
        }
        assert!(q.is_empty());
    }

    #[test]
    fn clear_empties_queue() {
        let q = ByteQueue::new();
        q.enqueue(1).unwrap();
        q.enqueue(2).unwrap();
        q.clear();
        assert!(q.is_empty());
        assert_eq!(q.len(), 0);
        assert_eq!(q.dequeue(), None);
    }

    #[test]
    fn single_producer_single_consumer() {
        let q = Arc::new(ByteQueue::new());
        let producer = {
            let q = Arc::clone(&q);
            thread::spawn(move || {
                for b in 0..=255u8 {
                    // Spin until the consumer makes room.
                    while q.enqueue(b).is_err() {
                        thread::yield_now();
                    }
                }
            })
        };
        let mut seen = Vec::new();
        while seen.len() < 256 {
            if let Some(b) = q.dequeue() {
                seen.push(b);
            } else {
                thread::yield_now();
            }
        }
        producer.join().unwrap();
        let expected: Vec<u8> = (0..=255).collect();
        assert_eq!(seen, expected);
    }
}

//! Ring Buffer Implementation

use crate::Sample;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;

/// Default buffer capacity (200 slots = ~1 s at 200 Hz)
pub const DEFAULT_CAPACITY: usize = 200;

/// Errors constructing a ring buffer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RingBufferError {
    /// One slot is reserved, so fewer than two slots cannot hold anything
    #[error("Ring buffer capacity must be at least 2, got {0}")]
    InvalidCapacity(usize),
}

/// Indices shared by producer and consumer.
///
/// Only ever touched while holding the buffer's lock.
#[derive(Debug, Default)]
struct Cursor {
    head: usize,
    tail: usize,
    overflow: bool,
}

/// Frozen view of the buffer indices taken under the lock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    /// Oldest unsent slot
    pub tail: usize,
    /// Next slot to be written
    pub head: usize,
    /// Whether samples were dropped since the previous snapshot
    pub overflow: bool,
}

impl Snapshot {
    /// Number of unsent samples between `tail` and `head`.
    ///
    /// `capacity` must be the capacity of the buffer the snapshot came from.
    pub fn count(&self, capacity: usize) -> usize {
        debug_assert!(capacity > 0, "snapshot count needs a non-zero capacity");
        (self.head + capacity - self.tail) % capacity
    }
}

/// Fixed-capacity sample store with drop-oldest overflow.
///
/// Slots are atomics so the consumer can read already-snapshotted samples
/// without holding the lock. The lock guards only the three indices and
/// is held for a handful of instructions per call.
pub struct RingBuffer {
    /// Pre-allocated storage, one packed `Sample` per slot
    slots: Box<[AtomicU64]>,
    /// Capacity of the buffer
    capacity: usize,
    /// Head, tail and overflow flag
    cursor: Mutex<Cursor>,
    /// Total samples appended (for statistics)
    total_written: AtomicUsize,
    /// Total samples discarded by drop-oldest (for statistics)
    total_dropped: AtomicUsize,
}

impl RingBuffer {
    /// Create a new ring buffer with given capacity
    pub fn new(capacity: usize) -> Result<Self, RingBufferError> {
        if capacity < 2 {
            return Err(RingBufferError::InvalidCapacity(capacity));
        }

        Ok(Self::allocate(capacity))
    }

    /// Create a buffer with default capacity (200 samples)
    pub fn with_default_capacity() -> Self {
        Self::allocate(DEFAULT_CAPACITY)
    }

    fn allocate(capacity: usize) -> Self {
        let slots: Vec<AtomicU64> = (0..capacity)
            .map(|_| AtomicU64::new(Sample::default().pack()))
            .collect();

        Self {
            slots: slots.into_boxed_slice(),
            capacity,
            cursor: Mutex::new(Cursor::default()),
            total_written: AtomicUsize::new(0),
            total_dropped: AtomicUsize::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Cursor> {
        // Critical sections never leave the indices half-updated, so a
        // panic elsewhere does not invalidate them.
        self.cursor.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a sample, discarding the oldest unsent one if full
    pub fn append(&self, value: u16, timestamp_ms: u32) {
        let mut cursor = self.lock();
        let head = cursor.head;
        let next_head = (head + 1) % self.capacity;

        if next_head == cursor.tail {
            cursor.tail = (cursor.tail + 1) % self.capacity;
            cursor.overflow = true;
            self.total_dropped.fetch_add(1, Ordering::Relaxed);
        }

        self.slots[head].store(Sample::new(value, timestamp_ms).pack(), Ordering::Release);
        cursor.head = next_head;
        drop(cursor);

        self.total_written.fetch_add(1, Ordering::Relaxed);
    }

    /// Read `(tail, head, overflow)` as one unit and reset the overflow flag
    pub fn snapshot(&self) -> Snapshot {
        let mut cursor = self.lock();
        let snapshot = Snapshot {
            tail: cursor.tail,
            head: cursor.head,
            overflow: cursor.overflow,
        };
        cursor.overflow = false;
        snapshot
    }

    /// Move the read position after a successful transmission
    pub fn advance_tail_to(&self, new_tail: usize) {
        self.lock().tail = new_tail % self.capacity;
    }

    /// Read the sample stored at `index` (taken modulo capacity)
    pub fn read(&self, index: usize) -> Sample {
        Sample::unpack(self.slots[index % self.capacity].load(Ordering::Acquire))
    }

    /// Get the number of unsent samples
    pub fn len(&self) -> usize {
        let cursor = self.lock();
        (cursor.head + self.capacity - cursor.tail) % self.capacity
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if buffer is full (the next append drops a sample)
    pub fn is_full(&self) -> bool {
        self.len() == self.capacity - 1
    }

    /// Get the buffer capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get fill ratio (0.0 to 1.0) against the usable `capacity - 1` slots
    pub fn fill_ratio(&self) -> f64 {
        self.len() as f64 / (self.capacity - 1) as f64
    }

    /// Get total samples appended (for statistics)
    pub fn total_written(&self) -> usize {
        self.total_written.load(Ordering::Relaxed)
    }

    /// Get total samples lost to drop-oldest (for statistics)
    pub fn total_dropped(&self) -> usize {
        self.total_dropped.load(Ordering::Relaxed)
    }
}

impl Default for RingBuffer {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

impl std::fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .field("total_written", &self.total_written())
            .field("total_dropped", &self.total_dropped())
            .finish()
    }
}

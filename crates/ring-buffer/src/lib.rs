//! Sample Ring Buffer
//!
//! Fixed-capacity circular store shared between the periodic sampler
//! (producer) and the frame encoder (consumer), with drop-oldest overflow.

mod buffer;

pub use buffer::{RingBuffer, RingBufferError, Snapshot, DEFAULT_CAPACITY};

use serde::{Deserialize, Serialize};

/// One analog reading with its acquisition time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    /// Raw ADC reading
    pub value: u16,
    /// Milliseconds since startup (wraps at `u32::MAX`)
    pub timestamp_ms: u32,
}

impl Sample {
    pub fn new(value: u16, timestamp_ms: u32) -> Self {
        Self {
            value,
            timestamp_ms,
        }
    }

    /// Pack into a single word so a slot can be stored atomically
    pub(crate) fn pack(self) -> u64 {
        ((self.value as u64) << 32) | self.timestamp_ms as u64
    }

    pub(crate) fn unpack(word: u64) -> Self {
        Self {
            value: (word >> 32) as u16,
            timestamp_ms: word as u32,
        }
    }
}

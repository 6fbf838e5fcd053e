//! ECG Sample Link Protocol
//!
//! Wire format shared by the device and the host:
//!
//! ```text
//! [u8 count][count x u16 value][count x u32 timestamp_ms][u16 crc]
//! ```
//!
//! Little-endian throughout. The CRC covers every byte before it.
//! A request with nothing to send gets no reply at all.

mod checksum;
mod client;
mod command;
mod error;
mod frame;

pub use checksum::{Crc16, CRC_POLY};
pub use client::{HostClient, DEFAULT_BAUD_RATE};
pub use command::Command;
pub use error::ProtocolError;
pub use frame::{
    decode_frame, decode_payload, frame_len, FrameBuilder, CRC_LEN, MAX_FRAME_LEN,
    MAX_SAMPLES_PER_FRAME, SAMPLE_WIRE_LEN,
};
pub use ring_buffer::Sample;

/// Request byte (`'R'`) that triggers one frame
pub const REQUEST_FRAME: u8 = 0x52;

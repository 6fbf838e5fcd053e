//! Frame layout, incremental builder and host-side decoder

use crate::checksum::Crc16;
use crate::error::ProtocolError;
use ring_buffer::Sample;

/// Largest count the one-byte count field can carry
pub const MAX_SAMPLES_PER_FRAME: usize = u8::MAX as usize;

/// Bytes per sample on the wire (u16 value + u32 timestamp)
pub const SAMPLE_WIRE_LEN: usize = 2 + 4;

/// Trailing checksum length
pub const CRC_LEN: usize = 2;

/// Largest possible frame (1533 bytes)
pub const MAX_FRAME_LEN: usize = frame_len(MAX_SAMPLES_PER_FRAME);

/// Total frame length for `count` samples
pub const fn frame_len(count: usize) -> usize {
    1 + count * SAMPLE_WIRE_LEN + CRC_LEN
}

/// Writes one frame into a reusable buffer, folding the checksum over each
/// byte as it is emitted.
///
/// Callers push exactly `count` values followed by exactly `count`
/// timestamps, then call [`FrameBuilder::finish`].
pub struct FrameBuilder<'a> {
    out: &'a mut Vec<u8>,
    crc: Crc16,
}

impl<'a> FrameBuilder<'a> {
    /// Clear `out` and emit the count byte
    pub fn begin(out: &'a mut Vec<u8>, count: u8) -> Self {
        out.clear();
        let mut builder = Self {
            out,
            crc: Crc16::new(),
        };
        builder.emit(&[count]);
        builder
    }

    fn emit(&mut self, bytes: &[u8]) {
        self.crc.extend(bytes);
        self.out.extend_from_slice(bytes);
    }

    pub fn push_value(&mut self, value: u16) {
        self.emit(&value.to_le_bytes());
    }

    pub fn push_timestamp(&mut self, timestamp_ms: u32) {
        self.emit(&timestamp_ms.to_le_bytes());
    }

    /// Append the checksum and return it
    pub fn finish(self) -> u16 {
        let crc = self.crc.value();
        self.out.extend_from_slice(&crc.to_le_bytes());
        crc
    }
}

/// Decode a complete frame, count byte included
pub fn decode_frame(frame: &[u8]) -> Result<Vec<Sample>, ProtocolError> {
    let (&count, payload) = frame.split_first().ok_or(ProtocolError::LengthMismatch {
        expected: frame_len(0),
        actual: 0,
    })?;
    decode_payload(count, payload)
}

/// Decode the bytes following an already-read count byte
pub fn decode_payload(count: u8, payload: &[u8]) -> Result<Vec<Sample>, ProtocolError> {
    if count == 0 {
        return Err(ProtocolError::InvalidCount(count));
    }

    let n = count as usize;
    let expected = frame_len(n);
    if payload.len() + 1 != expected {
        return Err(ProtocolError::LengthMismatch {
            expected,
            actual: payload.len() + 1,
        });
    }

    let body_len = n * SAMPLE_WIRE_LEN;
    let (body, trailer) = payload.split_at(body_len);

    let mut crc = Crc16::new();
    crc.push(count);
    crc.extend(body);
    let received = u16::from_le_bytes([trailer[0], trailer[1]]);
    if crc.value() != received {
        return Err(ProtocolError::ChecksumMismatch {
            expected: received,
            actual: crc.value(),
        });
    }

    let (values, timestamps) = body.split_at(n * 2);
    let samples = values
        .chunks_exact(2)
        .zip(timestamps.chunks_exact(4))
        .map(|(v, t)| {
            Sample::new(
                u16::from_le_bytes([v[0], v[1]]),
                u32::from_le_bytes([t[0], t[1], t[2], t[3]]),
            )
        })
        .collect();

    Ok(samples)
}

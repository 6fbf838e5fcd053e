//! CRC-16 checksum engine

/// Reflected polynomial (0x8005 bit-reversed), processed LSB-first
pub const CRC_POLY: u16 = 0xA001;

/// Incremental CRC-16 (poly 0xA001, init 0, no final XOR).
///
/// Computed bitwise without a lookup table. Matches the catalogued
/// CRC-16/ARC parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Crc16 {
    state: u16,
}

impl Crc16 {
    /// Start a new checksum with state 0
    pub const fn new() -> Self {
        Self { state: 0 }
    }

    /// Fold one byte into `state` and return the new state
    pub const fn update(state: u16, byte: u8) -> u16 {
        let mut crc = state ^ byte as u16;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ CRC_POLY
            } else {
                crc >> 1
            };
            bit += 1;
        }
        crc
    }

    /// Checksum of a complete byte slice
    pub fn checksum(bytes: &[u8]) -> u16 {
        bytes.iter().fold(0, |state, &byte| Self::update(state, byte))
    }

    pub fn push(&mut self, byte: u8) {
        self.state = Self::update(self.state, byte);
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.push(byte);
        }
    }

    /// Current checksum value
    pub fn value(&self) -> u16 {
        self.state
    }
}

//! Protocol Error Types

use thiserror::Error;

/// Errors that can occur on the sample link
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Serial port could not be opened or configured
    #[error("Serial port error: {0}")]
    Serial(String),

    /// Read or write on the link failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Frame started but did not complete in time
    #[error("Timeout waiting for frame after {0}ms")]
    Timeout(u64),

    /// Checksum mismatch
    #[error("Checksum mismatch: expected {expected:04X}, got {actual:04X}")]
    ChecksumMismatch { expected: u16, actual: u16 },

    /// Frame length disagrees with its count byte
    #[error("Frame length mismatch: expected {expected} bytes, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// Count byte the device never sends
    #[error("Invalid sample count {0}")]
    InvalidCount(u8),

    /// No serial port answered with a valid frame
    #[error("No serial device with a valid sample frame found")]
    NoDevice,
}

impl From<tokio_serial::Error> for ProtocolError {
    fn from(err: tokio_serial::Error) -> Self {
        ProtocolError::Serial(err.to_string())
    }
}

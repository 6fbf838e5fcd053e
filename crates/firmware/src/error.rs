//! Firmware Error Types

use ecg_protocol::ProtocolError;
use ring_buffer::RingBufferError;
use sampler::SamplerError;
use thiserror::Error;

/// Errors starting or running the device
#[derive(Debug, Error)]
pub enum FirmwareError {
    /// Configuration could not be read
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Configuration was read but is unusable
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error(transparent)]
    RingBuffer(#[from] RingBufferError),

    #[error(transparent)]
    Sampler(#[from] SamplerError),

    /// Host link failure
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Global subscriber already installed
    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}

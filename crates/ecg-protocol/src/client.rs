//! Host-side client for polling a sampling device
//!
//! Sends the request byte and reads back one frame. A device with nothing
//! buffered stays silent, so a timeout on the count byte means "no new
//! data" rather than a failure.

use crate::error::ProtocolError;
use crate::frame::{decode_payload, CRC_LEN, MAX_FRAME_LEN, SAMPLE_WIRE_LEN};
use crate::REQUEST_FRAME;
use ring_buffer::Sample;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_serial::{ClearBuffer, SerialPort, SerialPortBuilderExt, SerialStream};
use tracing::{debug, info, trace, warn};

/// Default link speed
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Boards commonly reset when the port opens
const PROBE_RESET_DELAY: Duration = Duration::from_millis(1500);
const PROBE_ATTEMPTS: usize = 3;
const PROBE_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Client for a sampling device on a byte stream (normally a serial port)
pub struct HostClient<S = SerialStream> {
    /// Device name for logging
    device: String,
    stream: S,
    /// Reply timeout
    timeout: Duration,
    /// Reusable receive buffer
    rx: Vec<u8>,
}

impl<S> HostClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap an already-open stream
    pub fn from_stream(device: &str, stream: S, timeout: Duration) -> Self {
        Self {
            device: device.to_string(),
            stream,
            timeout,
            rx: Vec::with_capacity(MAX_FRAME_LEN),
        }
    }

    /// Request one frame and return its samples.
    ///
    /// Returns an empty vector when the device does not answer within the
    /// timeout.
    pub async fn request_frame(&mut self) -> Result<Vec<Sample>, ProtocolError> {
        self.stream.write_all(&[REQUEST_FRAME]).await?;
        self.stream.flush().await?;

        let mut count = [0u8; 1];
        match tokio::time::timeout(self.timeout, self.stream.read_exact(&mut count)).await {
            Ok(result) => {
                result?;
            }
            Err(_) => {
                trace!("No reply from {}", self.device);
                return Ok(Vec::new());
            }
        }

        let payload_len = count[0] as usize * SAMPLE_WIRE_LEN + CRC_LEN;
        self.rx.resize(payload_len, 0);
        tokio::time::timeout(self.timeout, self.stream.read_exact(&mut self.rx))
            .await
            .map_err(|_| ProtocolError::Timeout(self.timeout.as_millis() as u64))??;

        let samples = decode_payload(count[0], &self.rx)?;
        debug!("Received {} samples from {}", samples.len(), self.device);
        Ok(samples)
    }

    /// Get the device name
    pub fn device(&self) -> &str {
        &self.device
    }
}

impl HostClient<SerialStream> {
    /// Open a serial device
    pub fn open(device: &str, baud_rate: u32, timeout: Duration) -> Result<Self, ProtocolError> {
        info!("Opening sample link on {} at {} baud", device, baud_rate);
        let stream = tokio_serial::new(device, baud_rate)
            .timeout(timeout)
            .open_native_async()?;
        Ok(Self::from_stream(device, stream, timeout))
    }

    /// Try every serial port, last-listed first, and keep the first one
    /// that answers with a valid frame.
    pub async fn open_first(baud_rate: u32, timeout: Duration) -> Result<Self, ProtocolError> {
        let ports = tokio_serial::available_ports()?;
        if ports.is_empty() {
            warn!("No serial ports found");
            return Err(ProtocolError::NoDevice);
        }

        for port in ports.iter().rev() {
            debug!("Trying {}", port.port_name);
            let mut client = match Self::open(&port.port_name, baud_rate, timeout) {
                Ok(client) => client,
                Err(e) => {
                    debug!("Cannot open {}: {}", port.port_name, e);
                    continue;
                }
            };

            if client.probe().await {
                info!("Connected to {}", port.port_name);
                return Ok(client);
            }
            debug!("{} did not answer with a valid frame", port.port_name);
        }

        Err(ProtocolError::NoDevice)
    }

    /// Check that the device answers requests with valid, non-empty frames.
    ///
    /// A malformed or truncated reply only costs one attempt; stale bytes
    /// from a board reset are common. Link errors give up on the port.
    pub async fn probe(&mut self) -> bool {
        self.clear_input();
        tokio::time::sleep(PROBE_RESET_DELAY).await;

        for attempt in 1..=PROBE_ATTEMPTS {
            match self.request_frame().await {
                Ok(samples) if !samples.is_empty() => return true,
                Ok(_) => trace!("Probe attempt {} on {}: no data", attempt, self.device),
                Err(e @ (ProtocolError::Io(_) | ProtocolError::Serial(_))) => {
                    debug!("Probe of {} failed: {}", self.device, e);
                    return false;
                }
                Err(e) => debug!("Probe attempt {} on {}: {}", attempt, self.device, e),
            }
            tokio::time::sleep(PROBE_RETRY_DELAY).await;
            self.clear_input();
        }
        false
    }

    /// Discard stale bytes waiting in the receive buffer
    pub fn clear_input(&mut self) {
        if let Err(e) = self.stream.clear(ClearBuffer::Input) {
            warn!("Failed to clear input on {}: {}", self.device, e);
        }
    }
}

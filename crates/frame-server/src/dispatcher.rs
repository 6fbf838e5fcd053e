//! Request Dispatcher
//!
//! Reads command bytes from the host link. `'R'` triggers one frame; every
//! other byte is consumed and ignored without a reply.

use crate::encoder::FrameEncoder;
use ecg_protocol::{Command, ProtocolError};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tracing::{debug, info, trace, warn};

/// Inbound chunk size; commands are single bytes
const READ_CHUNK: usize = 64;

/// Dispatcher state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    /// Waiting for a command byte
    Idle,
    /// Building and sending one frame
    Encoding,
}

/// Request/response loop serving frames to the host
pub struct RequestDispatcher {
    encoder: FrameEncoder,
    state: DispatcherState,
    /// Frames written (non-empty replies)
    frames_sent: u64,
    /// Unrecognised bytes discarded
    bytes_ignored: u64,
}

impl RequestDispatcher {
    pub fn new(encoder: FrameEncoder) -> Self {
        Self {
            encoder,
            state: DispatcherState::Idle,
            frames_sent: 0,
            bytes_ignored: 0,
        }
    }

    /// Handle one inbound byte; returns the number of samples sent
    pub async fn handle_byte<W>(&mut self, byte: u8, writer: &mut W) -> Result<usize, ProtocolError>
    where
        W: AsyncWrite + Unpin,
    {
        match Command::from_byte(byte) {
            Some(Command::RequestFrame) => {
                self.state = DispatcherState::Encoding;
                let result = self.encoder.send(writer).await;
                // One attempt per request, whatever the outcome
                self.state = DispatcherState::Idle;

                if let Ok(count) = result {
                    if count > 0 {
                        self.frames_sent += 1;
                    }
                }
                result
            }
            None => {
                trace!("Ignoring byte {:#04x}", byte);
                self.bytes_ignored += 1;
                Ok(0)
            }
        }
    }

    /// Serve requests until the reader reaches end of stream.
    ///
    /// A failed write is logged and the loop keeps serving; the unsent
    /// samples go out with the next successful frame. Read errors end the
    /// loop.
    pub async fn run<R, W>(&mut self, reader: &mut R, writer: &mut W) -> Result<(), ProtocolError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!("Serving sample frames");
        let mut inbound = [0u8; READ_CHUNK];

        loop {
            let n = reader.read(&mut inbound).await?;
            if n == 0 {
                info!(
                    "Host link closed after {} frames ({} bytes ignored)",
                    self.frames_sent, self.bytes_ignored
                );
                return Ok(());
            }

            for &byte in &inbound[..n] {
                if let Err(e) = self.handle_byte(byte, writer).await {
                    warn!("Failed to send frame: {}", e);
                }
            }
            debug!("Buffer at {:.0}%", self.encoder.buffer().fill_ratio() * 100.0);
        }
    }

    /// Current state
    pub fn state(&self) -> DispatcherState {
        self.state
    }

    /// Get the number of frames sent
    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    /// Get the number of bytes ignored
    pub fn bytes_ignored(&self) -> u64 {
        self.bytes_ignored
    }
}

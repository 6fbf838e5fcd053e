//! ECG Sampling Firmware
//!
//! Wires the sampler, ring buffer and frame server together behind a host
//! link and provides startup configuration and logging for the binaries.

mod error;
mod settings;

pub use crate::error::FirmwareError;
pub use crate::settings::{parse_level, FirmwareConfig, HostConfig, DEFAULT_CONFIG_FILE};

use ecg_protocol::ProtocolError;
use frame_server::{FrameEncoder, RequestDispatcher};
use ring_buffer::RingBuffer;
use sampler::{MonotonicClock, Sampler, SimulatedAdc};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::watch;
use tokio_serial::SerialPortBuilderExt;
use tracing::{info, warn};
use tracing_subscriber::FmtSubscriber;

/// The device: one ring buffer shared by a sampler and a frame server
pub struct Firmware {
    config: FirmwareConfig,
    buffer: Arc<RingBuffer>,
    /// Timestamp origin, fixed at startup
    clock: MonotonicClock,
}

impl Firmware {
    /// Allocate the ring buffer; it lives as long as the firmware
    pub fn new(config: FirmwareConfig) -> Result<Self, FirmwareError> {
        config.validate()?;
        let buffer = Arc::new(RingBuffer::new(config.buffer_capacity)?);
        info!(
            "Ring buffer ready: {} slots, {:.2} s at {} Hz",
            buffer.capacity(),
            (buffer.capacity() - 1) as f64 / config.sample_rate_hz() as f64,
            config.sample_rate_hz()
        );
        Ok(Self {
            config,
            buffer,
            clock: MonotonicClock::new(),
        })
    }

    /// Sample and answer requests on `link` until the host closes it or
    /// `shutdown` turns `true`
    pub async fn serve<S>(
        &self,
        link: S,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), FirmwareError>
    where
        S: AsyncRead + AsyncWrite,
    {
        let sampler = Sampler::new(
            self.config.sampler_config(),
            Arc::clone(&self.buffer),
            SimulatedAdc::new(self.config.simulated_bpm, self.config.sample_rate_hz()),
            self.clock,
        )?;

        let (stop_tx, stop_rx) = watch::channel(false);
        let sampler_task = tokio::spawn(sampler.run(stop_rx));

        let (mut reader, mut writer) = tokio::io::split(link);
        let mut dispatcher = RequestDispatcher::new(FrameEncoder::new(Arc::clone(&self.buffer)));

        let served = tokio::select! {
            served = dispatcher.run(&mut reader, &mut writer) => served,
            _ = stopped(&mut shutdown) => {
                info!("Shutdown requested");
                Ok(())
            }
        };

        let _ = stop_tx.send(true);
        if let Err(e) = sampler_task.await {
            warn!("Sampler task failed: {}", e);
        }

        served.map_err(FirmwareError::from)
    }

    /// Open the configured serial device and serve it until Ctrl-C
    pub async fn run(self) -> Result<(), FirmwareError> {
        info!(
            "Opening host link on {} at {} baud",
            self.config.serial_device, self.config.baud_rate
        );
        let port = tokio_serial::new(&self.config.serial_device, self.config.baud_rate)
            .open_native_async()
            .map_err(ProtocolError::from)?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let serve = self.serve(port, shutdown_rx);
        tokio::pin!(serve);

        tokio::select! {
            served = &mut serve => return served,
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    warn!("Cannot listen for Ctrl-C: {}", e);
                }
            }
        }

        let _ = shutdown_tx.send(true);
        serve.await
    }

    /// Get the shared buffer
    pub fn buffer(&self) -> &Arc<RingBuffer> {
        &self.buffer
    }

    /// Get the configuration
    pub fn config(&self) -> &FirmwareConfig {
        &self.config
    }
}

/// Resolves once `shutdown` turns `true` or its sender is dropped
async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|&stop| stop).await;
}

/// Initialize logging to stderr at the given level
pub fn init_logging(level: &str) -> Result<(), FirmwareError> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(parse_level(level)?)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| FirmwareError::Logging(e.to_string()))
}

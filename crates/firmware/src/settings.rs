//! Startup configuration
//!
//! Layered with the `config` crate: built-in defaults, then an optional
//! TOML file, then `ECG_*` (device) or `ECG_HOST_*` (poll tool)
//! environment variables.

use crate::error::FirmwareError;
use config::{Config, Environment, File};
use ecg_protocol::DEFAULT_BAUD_RATE;
use ring_buffer::DEFAULT_CAPACITY;
use sampler::SamplerConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::Level;

/// Config file looked up when none is given on the command line
pub const DEFAULT_CONFIG_FILE: &str = "ecg-firmware";

/// Device-side configuration, fixed for the life of the process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FirmwareConfig {
    /// Serial device the host talks to
    pub serial_device: String,
    /// Link speed
    pub baud_rate: u32,
    /// Sampler tick period in microseconds
    pub sample_interval_us: u64,
    /// Ring buffer slots (one is reserved)
    pub buffer_capacity: usize,
    /// Analog input channel
    pub adc_channel: u8,
    /// Heart rate of the simulated analog source
    pub simulated_bpm: u32,
    /// Maximum log level
    pub log_level: String,
}

impl Default for FirmwareConfig {
    fn default() -> Self {
        Self {
            serial_device: "/dev/ttyGS0".to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            sample_interval_us: 5000,
            buffer_capacity: DEFAULT_CAPACITY,
            adc_channel: 0,
            simulated_bpm: 72,
            log_level: "info".to_string(),
        }
    }
}

impl FirmwareConfig {
    /// Load defaults, then `path` (or the default file if present), then
    /// the environment
    pub fn load(path: Option<&str>) -> Result<Self, FirmwareError> {
        let config: Self = layered(&Self::default(), path, DEFAULT_CONFIG_FILE, "ECG")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), FirmwareError> {
        if self.serial_device.is_empty() {
            return Err(FirmwareError::Invalid("serial_device is empty".into()));
        }
        if self.baud_rate == 0 {
            return Err(FirmwareError::Invalid("baud_rate must be non-zero".into()));
        }
        if self.buffer_capacity < 2 {
            return Err(FirmwareError::Invalid(format!(
                "buffer_capacity must be at least 2, got {}",
                self.buffer_capacity
            )));
        }
        if self.simulated_bpm == 0 {
            return Err(FirmwareError::Invalid("simulated_bpm must be non-zero".into()));
        }
        self.sampler_config().validate()?;
        parse_level(&self.log_level)?;
        Ok(())
    }

    /// Sampler settings derived from this configuration
    pub fn sampler_config(&self) -> SamplerConfig {
        SamplerConfig {
            interval: Duration::from_micros(self.sample_interval_us),
            channel: self.adc_channel,
        }
    }

    /// Whole samples per second, at least 1
    pub fn sample_rate_hz(&self) -> u32 {
        (1_000_000 / self.sample_interval_us.max(1)).max(1) as u32
    }
}

/// Host poll tool configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostConfig {
    /// Serial device; empty means scan all ports
    pub serial_device: String,
    /// Link speed
    pub baud_rate: u32,
    /// Delay between requests in milliseconds
    pub poll_interval_ms: u64,
    /// Reply timeout in milliseconds
    pub timeout_ms: u64,
    /// Expected spacing of device timestamps, used to spot dropped samples
    pub sample_interval_ms: u32,
    /// Maximum log level
    pub log_level: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            serial_device: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            poll_interval_ms: 20,
            timeout_ms: 200,
            sample_interval_ms: 5,
            log_level: "info".to_string(),
        }
    }
}

impl HostConfig {
    pub fn load(path: Option<&str>) -> Result<Self, FirmwareError> {
        let config: Self = layered(&Self::default(), path, "ecg-poll", "ECG_HOST")?;
        if config.poll_interval_ms == 0 || config.timeout_ms == 0 {
            return Err(FirmwareError::Invalid(
                "poll_interval_ms and timeout_ms must be non-zero".into(),
            ));
        }
        parse_level(&config.log_level)?;
        Ok(config)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn layered<T>(
    defaults: &T,
    path: Option<&str>,
    default_file: &str,
    env_prefix: &str,
) -> Result<T, FirmwareError>
where
    T: Serialize + for<'de> Deserialize<'de>,
{
    let file = match path {
        Some(path) => File::with_name(path),
        None => File::with_name(default_file).required(false),
    };

    let config = Config::builder()
        .add_source(Config::try_from(defaults)?)
        .add_source(file)
        .add_source(Environment::with_prefix(env_prefix).try_parsing(true))
        .build()?;

    Ok(config.try_deserialize()?)
}

/// Parse a `log_level` setting
pub fn parse_level(level: &str) -> Result<Level, FirmwareError> {
    level
        .parse::<Level>()
        .map_err(|_| FirmwareError::Invalid(format!("unknown log level '{}'", level)))
}

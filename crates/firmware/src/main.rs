//! ECG Firmware - Main Entry Point
//!
//! Usage: `ecg-firmware [config-file]`

use anyhow::Context;
use firmware::{init_logging, Firmware, FirmwareConfig};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = std::env::args().nth(1);
    let config = FirmwareConfig::load(path.as_deref()).context("Failed to load configuration")?;
    init_logging(&config.log_level)?;

    info!("=== ECG Firmware v{} ===", env!("CARGO_PKG_VERSION"));
    info!(
        "Sampling channel {} every {} us",
        config.adc_channel, config.sample_interval_us
    );

    Firmware::new(config)?.run().await?;

    info!("Firmware stopped");
    Ok(())
}

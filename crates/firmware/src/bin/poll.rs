//! Host poll tool
//!
//! Requests frames from a device at a fixed interval and prints each sample
//! as a JSON line on stdout. Usage: `ecg-poll [config-file]`

use anyhow::Context;
use ecg_protocol::{HostClient, ProtocolError, Sample};
use firmware::{init_logging, HostConfig};
use std::io::Write;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = std::env::args().nth(1);
    let config = HostConfig::load(path.as_deref()).context("Failed to load configuration")?;
    init_logging(&config.log_level)?;

    let mut client = if config.serial_device.is_empty() {
        info!("Scanning serial ports...");
        HostClient::open_first(config.baud_rate, config.timeout()).await?
    } else {
        HostClient::open(&config.serial_device, config.baud_rate, config.timeout())?
    };
    info!("Polling {} every {} ms", client.device(), config.poll_interval_ms);

    let mut ticker = tokio::time::interval(config.poll_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last: Option<Sample> = None;
    let stdout = std::io::stdout();
    let mut ctrl_c = std::pin::pin!(tokio::signal::ctrl_c());

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = &mut ctrl_c => break,
        }

        let samples = match client.request_frame().await {
            Ok(samples) => samples,
            Err(e @ ProtocolError::Io(_)) => return Err(e.into()),
            Err(e) => {
                // Bad frame: drop it and ask again next tick
                warn!("Discarding frame: {}", e);
                client.clear_input();
                continue;
            }
        };

        let mut out = stdout.lock();
        for sample in samples {
            if let Some(prev) = last {
                let gap = sample.timestamp_ms.wrapping_sub(prev.timestamp_ms);
                if gap > 2 * config.sample_interval_ms {
                    warn!("Gap of {} ms before t={} ms, samples were dropped", gap, sample.timestamp_ms);
                }
            }
            writeln!(out, "{}", serde_json::to_string(&sample)?)?;
            last = Some(sample);
        }
        out.flush()?;
    }

    info!("Stopped polling");
    Ok(())
}

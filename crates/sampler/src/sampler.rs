//! Periodic Sampler Implementation

use crate::input::{AnalogInput, Clock};
use ring_buffer::RingBuffer;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Errors in sampler construction
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SamplerError {
    /// Zero-length tick period
    #[error("Sampling interval must be non-zero")]
    ZeroInterval,
}

/// Configuration for the sampler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplerConfig {
    /// Tick period (default: 5000 µs, i.e. 200 Hz)
    pub interval: Duration,
    /// Analog channel to read
    pub channel: u8,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_micros(5000),
            channel: 0,
        }
    }
}

impl SamplerConfig {
    /// Sampling rate in Hz
    pub fn rate_hz(&self) -> f64 {
        1.0 / self.interval.as_secs_f64()
    }

    pub fn validate(&self) -> Result<(), SamplerError> {
        if self.interval.is_zero() {
            return Err(SamplerError::ZeroInterval);
        }
        Ok(())
    }
}

/// Periodic producer feeding the ring buffer
pub struct Sampler<A, C> {
    /// Shared sample store
    buffer: Arc<RingBuffer>,
    input: A,
    clock: C,
    config: SamplerConfig,
    /// Drop count seen at the previous tick
    last_dropped: usize,
    /// Whether the previous tick dropped a sample
    dropping: bool,
}

impl<A: AnalogInput, C: Clock> Sampler<A, C> {
    /// Create a new sampler
    pub fn new(
        config: SamplerConfig,
        buffer: Arc<RingBuffer>,
        input: A,
        clock: C,
    ) -> Result<Self, SamplerError> {
        config.validate()?;
        let last_dropped = buffer.total_dropped();
        Ok(Self {
            buffer,
            input,
            clock,
            config,
            last_dropped,
            dropping: false,
        })
    }

    /// Take one sample: one analog read, one clock read, one append
    pub fn tick(&mut self) {
        let value = self.input.read(self.config.channel);
        let timestamp_ms = self.clock.now_ms();
        self.buffer.append(value, timestamp_ms);
    }

    /// Run the tick loop until `shutdown` turns `true` or its sender is dropped
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Starting sampler on channel {} at {:.1} Hz",
            self.config.channel,
            self.config.rate_hz()
        );

        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick();
                    self.report_drops();
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!(
            "Sampler stopped after {} samples ({} dropped)",
            self.buffer.total_written(),
            self.buffer.total_dropped()
        );
    }

    /// Warn once when the host starts falling behind, not on every drop
    fn report_drops(&mut self) {
        let dropped = self.buffer.total_dropped();
        if dropped > self.last_dropped {
            if !self.dropping {
                warn!(
                    "Ring buffer full, dropping oldest samples ({} total)",
                    dropped
                );
            }
            self.dropping = true;
        } else if self.dropping {
            debug!("Host caught up after {} dropped samples", dropped);
            self.dropping = false;
        }
        self.last_dropped = dropped;
    }

    /// Get the configuration
    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{MonotonicClock, SimulatedAdc};
    use std::cell::Cell;

    struct Counter(u16);

    impl AnalogInput for Counter {
        fn read(&mut self, _channel: u8) -> u16 {
            self.0 += 1;
            self.0
        }
    }

    struct StepClock(Cell<u32>);

    impl Clock for StepClock {
        fn now_ms(&self) -> u32 {
            let now = self.0.get();
            self.0.set(now.wrapping_add(5));
            now
        }
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config = SamplerConfig {
            interval: Duration::ZERO,
            channel: 0,
        };
        let buffer = Arc::new(RingBuffer::with_default_capacity());
        let result = Sampler::new(config, buffer, Counter(0), StepClock(Cell::new(0)));
        assert_eq!(result.err(), Some(SamplerError::ZeroInterval));
    }

    #[test]
    fn test_default_rate() {
        assert!((SamplerConfig::default().rate_hz() - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_tick_appends_one_sample() {
        let buffer = Arc::new(RingBuffer::new(16).unwrap());
        let mut sampler = Sampler::new(
            SamplerConfig::default(),
            Arc::clone(&buffer),
            Counter(0),
            StepClock(Cell::new(1000)),
        )
        .unwrap();

        sampler.tick();
        sampler.tick();
        sampler.tick();

        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.read(0).value, 1);
        assert_eq!(buffer.read(0).timestamp_ms, 1000);
        assert_eq!(buffer.read(2).value, 3);
        assert_eq!(buffer.read(2).timestamp_ms, 1010);
    }

    #[test]
    fn test_timestamp_wraps() {
        let buffer = Arc::new(RingBuffer::new(4).unwrap());
        let mut sampler = Sampler::new(
            SamplerConfig::default(),
            Arc::clone(&buffer),
            Counter(0),
            StepClock(Cell::new(u32::MAX - 2)),
        )
        .unwrap();

        sampler.tick();
        sampler.tick();
        assert_eq!(buffer.read(0).timestamp_ms, u32::MAX - 2);
        assert_eq!(buffer.read(1).timestamp_ms, 2);
    }

    #[test]
    fn test_tick_beyond_capacity_drops_oldest() {
        let buffer = Arc::new(RingBuffer::new(4).unwrap());
        let mut sampler = Sampler::new(
            SamplerConfig::default(),
            Arc::clone(&buffer),
            Counter(0),
            StepClock(Cell::new(0)),
        )
        .unwrap();

        for _ in 0..6 {
            sampler.tick();
            sampler.report_drops();
        }

        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.total_dropped(), 3);
        assert_eq!(sampler.last_dropped, 3);
        assert!(sampler.dropping);

        // A consumer drains the buffer; the next tick stops dropping
        let snapshot = buffer.snapshot();
        buffer.advance_tail_to(snapshot.head);
        sampler.tick();
        sampler.report_drops();
        assert!(!sampler.dropping);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_ticks_at_interval() {
        let buffer = Arc::new(RingBuffer::new(64).unwrap());
        let sampler = Sampler::new(
            SamplerConfig::default(),
            Arc::clone(&buffer),
            SimulatedAdc::new(60, 200),
            MonotonicClock::new(),
        )
        .unwrap();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(sampler.run(shutdown_rx));

        tokio::time::sleep(Duration::from_millis(52)).await;
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        // Ticks at 0, 5, ..., 50 ms
        assert_eq!(buffer.len(), 11);
        assert_eq!(buffer.read(0).timestamp_ms, 0);
        assert_eq!(buffer.read(10).timestamp_ms, 50);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_when_sender_dropped() {
        let buffer = Arc::new(RingBuffer::new(8).unwrap());
        let sampler = Sampler::new(
            SamplerConfig::default(),
            buffer,
            SimulatedAdc::new(60, 200),
            MonotonicClock::new(),
        )
        .unwrap();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(sampler.run(shutdown_rx));
        drop(shutdown_tx);
        handle.await.unwrap();
    }
}

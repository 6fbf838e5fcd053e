//! Analog input and clock sources for the sampler

use tokio::time::Instant;

/// A single-shot analog-to-digital reading
pub trait AnalogInput {
    /// Read the given channel once
    fn read(&mut self, channel: u8) -> u16;
}

/// Millisecond clock counting from startup
pub trait Clock {
    /// Milliseconds since startup, wrapping at `u32::MAX`
    fn now_ms(&self) -> u32;
}

/// Monotonic clock started at construction
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    start: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u32 {
        // Truncation is the wraparound
        self.start.elapsed().as_millis() as u32
    }
}

/// 10-bit ADC full scale
pub const ADC_MAX: u16 = 1023;

/// Synthetic ECG-like source for running without hardware.
///
/// Deterministic: the n-th read always returns the same value for a given
/// heart rate and sample rate.
#[derive(Debug, Clone)]
pub struct SimulatedAdc {
    /// Samples in one heartbeat
    samples_per_beat: u32,
    /// Position within the current beat
    position: u32,
}

/// (center as fraction of a beat, width, amplitude in ADC counts)
const WAVES: [(f32, f32, f32); 5] = [
    (0.20, 0.025, 40.0),   // P
    (0.36, 0.010, -30.0),  // Q
    (0.40, 0.012, 350.0),  // R
    (0.43, 0.010, -60.0),  // S
    (0.65, 0.040, 90.0),   // T
];

const BASELINE: f32 = 512.0;

impl SimulatedAdc {
    /// Create a source beating at `bpm` when read at `sample_rate_hz`
    pub fn new(bpm: u32, sample_rate_hz: u32) -> Self {
        let samples_per_beat = (sample_rate_hz * 60 / bpm.max(1)).max(1);
        Self {
            samples_per_beat,
            position: 0,
        }
    }

    fn level(&self) -> f32 {
        let phase = self.position as f32 / self.samples_per_beat as f32;
        WAVES.iter().fold(BASELINE, |acc, &(center, width, amplitude)| {
            let d = (phase - center) / width;
            acc + amplitude * (-0.5 * d * d).exp()
        })
    }
}

impl AnalogInput for SimulatedAdc {
    fn read(&mut self, _channel: u8) -> u16 {
        let value = self.level().round().clamp(0.0, ADC_MAX as f32) as u16;
        self.position = (self.position + 1) % self.samples_per_beat;
        value
    }
}

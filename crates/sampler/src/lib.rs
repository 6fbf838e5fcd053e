//! Periodic ADC Sampler
//!
//! Producer side of the sample path: reads one analog channel at a fixed
//! cadence and appends each reading to the shared ring buffer.

mod input;
mod sampler;

pub use input::{AnalogInput, Clock, MonotonicClock, SimulatedAdc, ADC_MAX};
pub use sampler::{Sampler, SamplerConfig, SamplerError};

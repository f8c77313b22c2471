//! Sensor abstractions used by the sampler
//!
//! The agent reads two physical sensors each cycle: a climate sensor for
//! temperature and humidity, and an analog gas sensor behind an ADC. Drivers
//! live outside this crate (or behind feature flags) and plug in through the
//! traits below.

#[cfg(feature = "sensor-sht40")]
mod sht40;

#[cfg(feature = "sensor-sht40")]
pub use sht40::SHT40Sensor;

use thiserror_no_std::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    #[error("{sensor}: failed to {operation} ({details})")]
    ReadFailed {
        sensor: &'static str,
        operation: &'static str,
        details: &'static str,
    },
}

/// Temperature and humidity from one climate measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClimateReadings {
    pub temperature_c: f32,
    pub humidity_pct: f32,
}

/// Sensor producing temperature and humidity.
///
/// Implementations may return NaN for a value the hardware flagged as
/// invalid; the sampler rejects those.
pub trait ClimateSensor {
    fn read(&mut self) -> impl Future<Output = Result<ClimateReadings, SensorError>>;
}

/// Analog gas sensor read through an ADC.
pub trait GasSensor {
    /// Raw converter count. A conversion that could not complete reads as 0,
    /// which calibrates to 0 ppm.
    fn read_raw(&mut self) -> impl Future<Output = u16>;
}

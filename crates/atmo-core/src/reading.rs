//! Measurement types produced by one sampling cycle

use alloc::string::String;

use crate::calibration::{AqiBucket, concentration_to_bucket};
use crate::error::SamplingFailure;

/// Unvalidated values straight off the sensors.
///
/// Temperature and humidity may be NaN when the climate sensor failed. The
/// gas count is always present.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawSample {
    pub raw_adc_count: u16,
    pub temperature_c: f32,
    pub humidity_pct: f32,
}

/// Link and clock facts stamped onto a reading when it is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SampleContext {
    /// Received signal strength in dBm, if the link can report it
    pub signal_strength: Option<i32>,
    /// Seconds since the agent started
    pub uptime_s: u64,
}

/// A validated measurement ready for publication.
///
/// Can only be built from a sample whose temperature and humidity are both
/// numbers. Fields are read-only once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    sensor_id: String,
    temperature_c: f32,
    humidity_pct: f32,
    gas_ppm: f32,
    aqi_bucket: AqiBucket,
    raw_adc_count: u16,
    signal_strength: Option<i32>,
    uptime_s: u64,
}

impl Reading {
    /// Validate a raw sample and derive the index from `gas_ppm`.
    pub fn new(
        sensor_id: &str,
        sample: RawSample,
        gas_ppm: f32,
        context: SampleContext,
    ) -> Result<Self, SamplingFailure> {
        if sample.temperature_c.is_nan() {
            return Err(SamplingFailure::InvalidTemperature);
        }
        if sample.humidity_pct.is_nan() {
            return Err(SamplingFailure::InvalidHumidity);
        }

        let aqi_bucket =
            concentration_to_bucket(gas_ppm, sample.temperature_c, sample.humidity_pct);

        Ok(Self {
            sensor_id: String::from(sensor_id),
            temperature_c: sample.temperature_c,
            humidity_pct: sample.humidity_pct,
            gas_ppm,
            aqi_bucket,
            raw_adc_count: sample.raw_adc_count,
            signal_strength: context.signal_strength,
            uptime_s: context.uptime_s,
        })
    }

    pub fn sensor_id(&self) -> &str {
        &self.sensor_id
    }

    pub fn temperature_c(&self) -> f32 {
        self.temperature_c
    }

    pub fn humidity_pct(&self) -> f32 {
        self.humidity_pct
    }

    pub fn gas_ppm(&self) -> f32 {
        self.gas_ppm
    }

    pub fn aqi_bucket(&self) -> AqiBucket {
        self.aqi_bucket
    }

    pub fn raw_adc_count(&self) -> u16 {
        self.raw_adc_count
    }

    pub fn signal_strength(&self) -> Option<i32> {
        self.signal_strength
    }

    pub fn uptime_s(&self) -> u64 {
        self.uptime_s
    }
}

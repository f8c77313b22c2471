//! Sensor sampling
//!
//! Reads the climate and gas sensors once, runs the gas count through the
//! calibration curve and validates the result into a [`Reading`].

use alloc::string::String;

use log::error;

use crate::calibration::{AdcSpec, CalibrationConstants, raw_to_concentration};
use crate::error::SamplingFailure;
use crate::reading::{RawSample, Reading, SampleContext};
use crate::sensors::{ClimateSensor, GasSensor};

pub struct Sampler<C, G> {
    climate: C,
    gas: G,
    sensor_id: String,
    adc: AdcSpec,
    constants: CalibrationConstants,
}

impl<C: ClimateSensor, G: GasSensor> Sampler<C, G> {
    pub fn new(
        climate: C,
        gas: G,
        sensor_id: &str,
        adc: AdcSpec,
        constants: CalibrationConstants,
    ) -> Self {
        Self {
            climate,
            gas,
            sensor_id: String::from(sensor_id),
            adc,
            constants,
        }
    }

    /// Read every sensor once without validating anything.
    ///
    /// A climate-sensor bus error is logged and reported as NaN for both
    /// values so that validation rejects the sample.
    pub async fn read_raw(&mut self) -> RawSample {
        let (temperature_c, humidity_pct) = match self.climate.read().await {
            Ok(readings) => (readings.temperature_c, readings.humidity_pct),
            Err(e) => {
                error!("Climate sensor read failed: {}", e);
                (f32::NAN, f32::NAN)
            }
        };

        let raw_adc_count = self.gas.read_raw().await;

        RawSample {
            raw_adc_count,
            temperature_c,
            humidity_pct,
        }
    }

    /// Take one sample and turn it into a reading.
    ///
    /// No reading is built when temperature or humidity is invalid.
    pub async fn sample(&mut self, context: SampleContext) -> Result<Reading, SamplingFailure> {
        let raw = self.read_raw().await;
        let gas_ppm = raw_to_concentration(raw.raw_adc_count, &self.adc, &self.constants);
        Reading::new(&self.sensor_id, raw, gas_ppm, context)
    }

    pub fn sensor_id(&self) -> &str {
        &self.sensor_id
    }
}

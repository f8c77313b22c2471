//! Sensirion SHT40 climate sensor

use embedded_hal_async::i2c::I2c;
use log::error;
use sht4x::{Precision, Sht4xAsync};

use super::{ClimateReadings, ClimateSensor, SensorError};

/// SHT40 at its default address, measuring with high repeatability.
pub struct SHT40Sensor<I> {
    sensor: Sht4xAsync<I, embassy_time::Delay>,
}

impl<I: I2c> SHT40Sensor<I> {
    pub fn new(i2c: I) -> Self {
        Self {
            sensor: Sht4xAsync::<I, embassy_time::Delay>::new(i2c),
        }
    }
}

impl<I: I2c> ClimateSensor for SHT40Sensor<I> {
    async fn read(&mut self) -> Result<ClimateReadings, SensorError> {
        let measurement = self
            .sensor
            .measure(Precision::High, &mut embassy_time::Delay)
            .await
            .map_err(|e| {
                error!("SHT40 measurement failed: {:?}", e);
                SensorError::ReadFailed {
                    sensor: "SHT40",
                    operation: "measure",
                    details: "no valid answer on I2C",
                }
            })?;

        Ok(ClimateReadings {
            temperature_c: measurement.temperature_celsius().to_num::<f32>(),
            humidity_pct: measurement.humidity_percent().to_num::<f32>(),
        })
    }
}

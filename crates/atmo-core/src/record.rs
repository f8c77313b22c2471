//! Outbound wire records
//!
//! A reading leaves the device as one flat JSON object. The field names are
//! fixed by the collectors, and they differ slightly between the HTTP
//! ingest endpoint and the message-bus topic.

use alloc::vec::Vec;

use serde::{Deserialize, Serialize};

use crate::reading::Reading;

/// Which collector a deployment talks to. Exactly one is active.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum WireFormat {
    /// JSON body POSTed to the ingest endpoint
    #[default]
    Http,
    /// JSON payload published to a message-bus topic
    MessageBus,
}

/// Record POSTed to the HTTP collector.
#[derive(Serialize, Debug)]
pub struct HttpRecord<'a> {
    pub sensor_id: &'a str,
    pub temperature: f32,
    pub humidity: f32,
    pub co2_ppm: f32,
    pub aqi: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rssi: Option<i32>,
    pub uptime_seconds: u64,
}

impl<'a> From<&'a Reading> for HttpRecord<'a> {
    fn from(reading: &'a Reading) -> Self {
        Self {
            sensor_id: reading.sensor_id(),
            temperature: reading.temperature_c(),
            humidity: reading.humidity_pct(),
            co2_ppm: reading.gas_ppm(),
            aqi: reading.aqi_bucket().value(),
            rssi: reading.signal_strength(),
            uptime_seconds: reading.uptime_s(),
        }
    }
}

/// Record published on the message bus. Carries the raw MQ135 count as well.
#[derive(Serialize, Debug)]
pub struct BusRecord<'a> {
    pub sensor_id: &'a str,
    pub temperature: f32,
    pub humidity: f32,
    pub mq135_raw: u16,
    pub co2_ppm: f32,
    pub aqi_calculated: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rssi: Option<i32>,
    pub uptime_seconds: u64,
}

impl<'a> From<&'a Reading> for BusRecord<'a> {
    fn from(reading: &'a Reading) -> Self {
        Self {
            sensor_id: reading.sensor_id(),
            temperature: reading.temperature_c(),
            humidity: reading.humidity_pct(),
            mq135_raw: reading.raw_adc_count(),
            co2_ppm: reading.gas_ppm(),
            aqi_calculated: reading.aqi_bucket().value(),
            rssi: reading.signal_strength(),
            uptime_seconds: reading.uptime_s(),
        }
    }
}

/// Serialize a reading in the given wire format.
pub fn encode(reading: &Reading, format: WireFormat) -> Result<Vec<u8>, serde_json::Error> {
    match format {
        WireFormat::Http => serde_json::to_vec(&HttpRecord::from(reading)),
        WireFormat::MessageBus => serde_json::to_vec(&BusRecord::from(reading)),
    }
}

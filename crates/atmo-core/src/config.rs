//! Agent configuration
//!
//! Deployments supply these values at build time (firmware) or from the
//! environment / a JSON file (simulator). Every field has a default so a
//! partial document is enough.

use embassy_time::Duration;
use serde::{Deserialize, Serialize};

use crate::calibration::{AdcSpec, CalibrationConstants};
use crate::http::Endpoint;
use crate::record::WireFormat;

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(bound(deserialize = "'de: 'a"), default)]
pub struct AgentConfig<'a> {
    /// Identifier stamped on every reading
    pub sensor_id: &'a str,
    /// Time between sampling cycles
    pub sampling_interval_ms: u64,
    /// Pause at the end of every scheduler iteration
    pub loop_yield_ms: u64,
    /// Upper bound for any single network call
    pub network_timeout_ms: u64,
    /// First association retry delay; zero disables pacing
    pub backoff_base_ms: u64,
    /// Ceiling for the association retry delay
    pub backoff_max_ms: u64,
    pub wire_format: WireFormat,
    pub collector: CollectorConfig<'a>,
    pub bus: BusConfig<'a>,
    pub internet: InternetConfig<'a>,
    pub adc: AdcSpec,
    pub calibration: CalibrationConstants,
}

impl AgentConfig<'_> {
    pub const fn sampling_interval(&self) -> Duration {
        Duration::from_millis(self.sampling_interval_ms)
    }

    pub const fn loop_yield(&self) -> Duration {
        Duration::from_millis(self.loop_yield_ms)
    }

    pub const fn network_timeout(&self) -> Duration {
        Duration::from_millis(self.network_timeout_ms)
    }
}

impl Default for AgentConfig<'_> {
    fn default() -> Self {
        Self {
            sensor_id: "atmo-01",
            sampling_interval_ms: 30_000,
            loop_yield_ms: 1_000,
            network_timeout_ms: 10_000,
            backoff_base_ms: 5_000,
            backoff_max_ms: 300_000,
            wire_format: WireFormat::Http,
            collector: CollectorConfig::default(),
            bus: BusConfig::default(),
            internet: InternetConfig::default(),
            adc: AdcSpec::default(),
            calibration: CalibrationConstants::default(),
        }
    }
}

/// HTTP ingest endpoint
#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
#[serde(bound(deserialize = "'de: 'a"), default)]
pub struct CollectorConfig<'a> {
    pub host: &'a str,
    pub port: u16,
    pub path: &'a str,
    pub api_key: Option<&'a str>,
}

impl<'a> CollectorConfig<'a> {
    pub const fn endpoint(&self) -> Endpoint<'a> {
        Endpoint {
            host: self.host,
            port: self.port,
            path: self.path,
        }
    }
}

impl Default for CollectorConfig<'_> {
    fn default() -> Self {
        Self {
            host: "localhost",
            port: 8000,
            path: "/ingest",
            api_key: None,
        }
    }
}

/// Message-bus broker session
#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
#[serde(bound(deserialize = "'de: 'a"), default)]
pub struct BusConfig<'a> {
    pub host: &'a str,
    pub port: u16,
    pub topic: &'a str,
    pub client_id: &'a str,
    /// Broker login; anonymous when absent
    pub username: Option<&'a str>,
    pub password: Option<&'a str>,
}

impl Default for BusConfig<'_> {
    fn default() -> Self {
        Self {
            host: "localhost",
            port: 8883,
            topic: "aqi/sensor/atmo-01",
            client_id: "atmo-01",
            username: None,
            password: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy)]
#[serde(bound(deserialize = "'de: 'a"), default)]
pub struct InternetConfig<'a> {
    pub ssid: &'a str,
    pub password: &'a str,
}

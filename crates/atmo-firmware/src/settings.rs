//! Build-time deployment settings
//!
//! `build.rs` forwards the `ATMO_*` entries of `.env` as compile-time
//! environment variables. Anything missing or empty keeps the agent default.

use core::str::FromStr;

use atmo_core::WireFormat;
use atmo_core::config::{AgentConfig, CollectorConfig, InternetConfig};

macro_rules! setting {
    ($name:literal) => {
        option_env!($name).filter(|value| !value.is_empty())
    };
}

fn number<T: FromStr>(value: Option<&str>, default: T) -> T {
    value.and_then(|v| v.parse().ok()).unwrap_or(default)
}

pub fn agent_config() -> AgentConfig<'static> {
    let defaults = AgentConfig::default();

    let wire_format = match setting!("ATMO_WIRE_FORMAT") {
        Some("message_bus") => WireFormat::MessageBus,
        _ => WireFormat::Http,
    };

    AgentConfig {
        sensor_id: setting!("ATMO_SENSOR_ID").unwrap_or(defaults.sensor_id),
        sampling_interval_ms: number(
            setting!("ATMO_SAMPLING_INTERVAL_MS"),
            defaults.sampling_interval_ms,
        ),
        network_timeout_ms: number(
            setting!("ATMO_NETWORK_TIMEOUT_MS"),
            defaults.network_timeout_ms,
        ),
        wire_format,
        collector: CollectorConfig {
            host: setting!("ATMO_COLLECTOR_HOST").unwrap_or(defaults.collector.host),
            port: number(setting!("ATMO_COLLECTOR_PORT"), defaults.collector.port),
            path: setting!("ATMO_COLLECTOR_PATH").unwrap_or(defaults.collector.path),
            api_key: setting!("ATMO_API_KEY"),
        },
        internet: InternetConfig {
            ssid: setting!("ATMO_WIFI_SSID").unwrap_or(""),
            password: setting!("ATMO_WIFI_PASSWORD").unwrap_or(""),
        },
        ..defaults
    }
}

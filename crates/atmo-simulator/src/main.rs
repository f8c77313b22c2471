//! Desktop simulator for the atmo air-quality telemetry agent.
//!
//! Runs the real [`atmo_core::Agent`] scheduler against synthetic sensors and
//! a simulated network link, so the whole sample → calibrate → publish loop
//! can be exercised without hardware.
//!
//! # Environment
//!
//! | Variable                   | Meaning                                          |
//! |----------------------------|--------------------------------------------------|
//! | `ATMO_CONFIG`              | Path to a JSON agent configuration               |
//! | `ATMO_SENSOR_ID`           | Overrides `sensor_id`                            |
//! | `ATMO_SAMPLING_INTERVAL_MS`| Overrides `sampling_interval_ms`                 |
//! | `ATMO_WIRE_FORMAT`         | `http` or `message_bus`                          |
//! | `ATMO_COLLECTOR_HOST`      | Overrides `collector.host`                       |
//! | `ATMO_COLLECTOR_PORT`      | Overrides `collector.port`                       |
//! | `ATMO_API_KEY`             | Sets `collector.api_key`                         |
//! | `ATMO_BUS_HOST`            | Overrides `bus.host`                             |
//! | `ATMO_BUS_PORT`            | Overrides `bus.port`                             |
//! | `ATMO_BUS_USERNAME`        | Sets `bus.username`; anonymous login when unset  |
//! | `ATMO_BUS_PASSWORD`        | Sets `bus.password`                              |
//! | `ATMO_SIM_COLLECTOR`       | `log` (default) or `live` to deliver for real    |
//! | `ATMO_SIM_LINK_FAILURES`   | Association attempts that fail before success    |
//! | `ATMO_SIM_LINK_UPTIME_S`   | Seconds the link stays up, `0` = never drops     |
//! | `ATMO_SIM_FAULT_EVERY`     | Climate reads between bus errors, `0` = never    |
//!
//! A `.env` file in the working directory is loaded first. Log output is
//! controlled with `RUST_LOG` as usual.

mod synthetic;
mod transport;

use std::str::FromStr;

use embassy_executor::Spawner;
use embassy_time::Duration;
use log::{error, info, warn};

use atmo_core::{Agent, AgentConfig, WireFormat};

use synthetic::{SimulatedLink, SyntheticClimate, SyntheticGas};
use transport::{HttpTransport, LogCollector, MqttTransport, SimTransport};

/// Sampling interval used when no configuration file is given.
const DEMO_SAMPLING_INTERVAL_MS: u64 = 5_000;

/// Read an optional numeric setting from the environment.
fn env_or<T: FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(value) => value.parse().unwrap_or_else(|_| {
            warn!("Ignoring unparsable {}={:?}", name, value);
            default
        }),
        Err(_) => default,
    }
}

fn load_config(text: &str) -> AgentConfig<'_> {
    if text.is_empty() {
        return AgentConfig {
            sensor_id: "atmo-sim",
            sampling_interval_ms: DEMO_SAMPLING_INTERVAL_MS,
            backoff_base_ms: 2_000,
            backoff_max_ms: 30_000,
            ..Default::default()
        };
    }

    serde_json::from_str(text).unwrap_or_else(|e| {
        error!("Invalid configuration, falling back to defaults: {}", e);
        AgentConfig::default()
    })
}

/// Settings taken from the environment, applied on top of the configuration.
#[derive(Debug, Default)]
struct Overrides {
    sensor_id: Option<String>,
    sampling_interval_ms: Option<u64>,
    wire_format: Option<WireFormat>,
    collector_host: Option<String>,
    collector_port: Option<u16>,
    api_key: Option<String>,
    bus_host: Option<String>,
    bus_port: Option<u16>,
    bus_username: Option<String>,
    bus_password: Option<String>,
}

impl Overrides {
    fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

        Self {
            sensor_id: var("ATMO_SENSOR_ID"),
            sampling_interval_ms: var("ATMO_SAMPLING_INTERVAL_MS").and_then(|v| v.parse().ok()),
            wire_format: var("ATMO_WIRE_FORMAT").and_then(|v| parse_wire_format(&v)),
            collector_host: var("ATMO_COLLECTOR_HOST"),
            collector_port: var("ATMO_COLLECTOR_PORT").and_then(|v| v.parse().ok()),
            api_key: var("ATMO_API_KEY"),
            bus_host: var("ATMO_BUS_HOST"),
            bus_port: var("ATMO_BUS_PORT").and_then(|v| v.parse().ok()),
            bus_username: var("ATMO_BUS_USERNAME"),
            bus_password: var("ATMO_BUS_PASSWORD"),
        }
    }

    fn apply<'a>(&'a self, config: &mut AgentConfig<'a>) {
        if let Some(id) = &self.sensor_id {
            config.sensor_id = id.as_str();
        }
        if let Some(ms) = self.sampling_interval_ms {
            config.sampling_interval_ms = ms;
        }
        if let Some(format) = self.wire_format {
            config.wire_format = format;
        }
        if let Some(host) = &self.collector_host {
            config.collector.host = host.as_str();
        }
        if let Some(port) = self.collector_port {
            config.collector.port = port;
        }
        if let Some(key) = &self.api_key {
            config.collector.api_key = Some(key.as_str());
        }
        if let Some(host) = &self.bus_host {
            config.bus.host = host.as_str();
        }
        if let Some(port) = self.bus_port {
            config.bus.port = port;
        }
        if let Some(username) = &self.bus_username {
            config.bus.username = Some(username.as_str());
        }
        if let Some(password) = &self.bus_password {
            config.bus.password = Some(password.as_str());
        }
    }
}

fn parse_wire_format(value: &str) -> Option<WireFormat> {
    match value {
        "http" => Some(WireFormat::Http),
        "message_bus" | "mqtt" => Some(WireFormat::MessageBus),
        other => {
            warn!("Unknown wire format {:?}", other);
            None
        }
    }
}

fn build_transport(config: &AgentConfig<'_>) -> SimTransport {
    let live = std::env::var("ATMO_SIM_COLLECTOR").is_ok_and(|v| v == "live");
    if !live {
        return SimTransport::Log(LogCollector::new(config.wire_format));
    }

    match config.wire_format {
        WireFormat::Http => {
            let endpoint = config.collector.endpoint();
            info!(
                "Posting to http://{}:{}{}",
                endpoint.host, endpoint.port, endpoint.path
            );
            SimTransport::Http(HttpTransport::new(&endpoint, config.network_timeout()))
        }
        WireFormat::MessageBus => {
            info!(
                "Publishing to mqtt://{}:{} as {} ({})",
                config.bus.host,
                config.bus.port,
                config.bus.client_id,
                if config.bus.username.is_some() {
                    "authenticated"
                } else {
                    "anonymous"
                }
            );
            SimTransport::Mqtt(MqttTransport::new(&config.bus, config.network_timeout()))
        }
    }
}

#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    let _ = dotenvy::dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    info!("Starting atmo-rs simulator");

    let text = match std::env::var("ATMO_CONFIG") {
        Ok(path) => std::fs::read_to_string(&path).unwrap_or_else(|e| {
            error!("Cannot read {}: {}", path, e);
            String::new()
        }),
        Err(_) => String::new(),
    };
    let overrides = Overrides::from_env();
    let mut config = load_config(&text);
    overrides.apply(&mut config);

    info!(
        "Sensor {} sampling every {} ms, {:?} records",
        config.sensor_id, config.sampling_interval_ms, config.wire_format
    );

    let climate = SyntheticClimate::new(env_or("ATMO_SIM_FAULT_EVERY", 7));
    let gas = SyntheticGas::new();
    let link = SimulatedLink::new(
        env_or("ATMO_SIM_LINK_FAILURES", 1),
        Duration::from_secs(env_or("ATMO_SIM_LINK_UPTIME_S", 120)),
    );
    let transport = build_transport(&config);

    let mut agent = Agent::from_config(climate, gas, link, transport, &config);
    agent.run().await
}

//! The scheduler loop
//!
//! [`Agent`] owns every piece of mutable state in the system and runs the one
//! control loop. Each iteration:
//!
//! 1. checks link health and gives the session its background slice,
//! 2. if the sampling interval has elapsed, samples, calibrates and publishes
//!    in strict sequence, then moves the sampling marker,
//! 3. sleeps for the loop yield.
//!
//! A cycle always finishes (delivered, rejected, failed or timed out) before
//! the next one can start, and nothing that happens inside a cycle can stop
//! the loop.

use embassy_time::{Duration, Instant, Timer};
use log::{info, warn};

use crate::config::AgentConfig;
use crate::connectivity::{ConnectivityManager, ConnectivitySettings, Link, Transport};
use crate::error::{PublishError, SamplingFailure};
use crate::publisher::Publisher;
use crate::reading::SampleContext;
use crate::sampler::Sampler;
use crate::sensors::{ClimateSensor, GasSensor};

/// What one scheduler iteration did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cycle {
    /// Sampling was not due yet
    Idle,
    /// Sensors produced an invalid value; nothing was published
    SamplingFailed(SamplingFailure),
    /// The reading reached the collector
    Delivered,
    /// The reading was dropped
    PublishFailed(PublishError),
}

/// Running counters, logged after every cycle
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AgentStats {
    pub cycles: u32,
    pub delivered: u32,
    pub rejected: u32,
    pub transport_failures: u32,
    pub connectivity_failures: u32,
    pub sampling_failures: u32,
}

impl AgentStats {
    fn record(&mut self, cycle: &Cycle) {
        match cycle {
            Cycle::Idle => return,
            Cycle::SamplingFailed(_) => self.sampling_failures += 1,
            Cycle::Delivered => self.delivered += 1,
            Cycle::PublishFailed(PublishError::Rejected(_)) => self.rejected += 1,
            Cycle::PublishFailed(e) if e.is_connectivity() => self.connectivity_failures += 1,
            Cycle::PublishFailed(_) => self.transport_failures += 1,
        }
        self.cycles += 1;
    }
}

pub struct Agent<C, G, L, T> {
    sampler: Sampler<C, G>,
    connection: ConnectivityManager<L, T>,
    publisher: Publisher,
    sampling_interval: Duration,
    loop_yield: Duration,
    started_at: Instant,
    last_sample: Option<Instant>,
    stats: AgentStats,
}

impl<C, G, L, T> Agent<C, G, L, T>
where
    C: ClimateSensor,
    G: GasSensor,
    L: Link,
    T: Transport,
{
    pub fn new(
        sampler: Sampler<C, G>,
        connection: ConnectivityManager<L, T>,
        publisher: Publisher,
        sampling_interval: Duration,
        loop_yield: Duration,
    ) -> Self {
        Self {
            sampler,
            connection,
            publisher,
            sampling_interval,
            loop_yield,
            started_at: Instant::now(),
            last_sample: None,
            stats: AgentStats::default(),
        }
    }

    /// Wire up an agent from sensors, network pieces and a configuration.
    pub fn from_config(climate: C, gas: G, link: L, transport: T, config: &AgentConfig<'_>) -> Self {
        let sampler = Sampler::new(
            climate,
            gas,
            config.sensor_id,
            config.adc,
            config.calibration,
        );
        let connection =
            ConnectivityManager::new(link, transport, ConnectivitySettings::from(config));

        Self::new(
            sampler,
            connection,
            Publisher::from_config(config),
            config.sampling_interval(),
            config.loop_yield(),
        )
    }

    pub fn stats(&self) -> AgentStats {
        self.stats
    }

    pub fn connection(&self) -> &ConnectivityManager<L, T> {
        &self.connection
    }

    /// Run the loop forever.
    pub async fn run(&mut self) -> ! {
        info!(
            "Agent {} running: sampling every {} ms",
            self.sampler.sensor_id(),
            self.sampling_interval.as_millis()
        );
        loop {
            self.tick().await;
        }
    }

    /// One scheduler iteration.
    pub async fn tick(&mut self) -> Cycle {
        self.connection.check_health();
        self.connection.service().await;

        let cycle = if self.sample_due(Instant::now()) {
            self.run_cycle().await
        } else {
            Cycle::Idle
        };

        Timer::after(self.loop_yield).await;
        cycle
    }

    fn sample_due(&self, now: Instant) -> bool {
        match self.last_sample {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.sampling_interval,
        }
    }

    async fn run_cycle(&mut self) -> Cycle {
        let started = Instant::now();
        let context = SampleContext {
            signal_strength: self.connection.signal_strength(),
            uptime_s: started.saturating_duration_since(self.started_at).as_secs(),
        };

        let cycle = match self.sampler.sample(context).await {
            Err(failure) => {
                warn!("Sampling failed, skipping cycle: {}", failure);
                Cycle::SamplingFailed(failure)
            }
            Ok(reading) => {
                info!(
                    "Reading: {:.2} °C, {:.2} %RH, {:.2} ppm (raw {}), AQI {} ({})",
                    reading.temperature_c(),
                    reading.humidity_pct(),
                    reading.gas_ppm(),
                    reading.raw_adc_count(),
                    reading.aqi_bucket().value(),
                    reading.aqi_bucket().label()
                );
                match self.publisher.publish(&mut self.connection, &reading).await {
                    Ok(()) => Cycle::Delivered,
                    Err(e) => {
                        warn!("Reading dropped: {}", e);
                        Cycle::PublishFailed(e)
                    }
                }
            }
        };

        // The marker moves whatever the outcome so failures keep the cadence.
        self.last_sample = Some(started);
        self.stats.record(&cycle);
        info!(
            "Cycle {}: delivered={} rejected={} transport={} connectivity={} sampling={}",
            self.stats.cycles,
            self.stats.delivered,
            self.stats.rejected,
            self.stats.transport_failures,
            self.stats.connectivity_failures,
            self.stats.sampling_failures
        );
        cycle
    }
}

//! Synthetic sensors and a simulated network link.

use embassy_time::{Duration, Instant, Timer};
use log::info;

use atmo_core::error::detail;
use atmo_core::sensors::{ClimateReadings, ClimateSensor, GasSensor, SensorError};
use atmo_core::{Link, LinkFailure};

/// Seconds since `origin` as a float, the time axis for every waveform.
fn seconds_since(origin: Instant) -> f64 {
    origin.elapsed().as_micros() as f64 / 1_000_000.0
}

// ---------------------------------------------------------------------------
// Sensors
// ---------------------------------------------------------------------------

/// Temperature and humidity that drift sinusoidally, with a bus error every
/// `fault_every` reads.
pub struct SyntheticClimate {
    origin: Instant,
    reads: u32,
    fault_every: u32,
}

impl SyntheticClimate {
    pub fn new(fault_every: u32) -> Self {
        Self {
            origin: Instant::now(),
            reads: 0,
            fault_every,
        }
    }

    fn readings_at(t: f64) -> ClimateReadings {
        // 20–26 °C and 40–60 %RH on unrelated periods
        let temperature = 23.0 + 3.0 * (t / 120.0).sin() + 0.5 * (t / 37.0).cos();
        let humidity = 50.0 + 10.0 * (t / 180.0).sin() + 2.0 * (t / 23.0).cos();

        ClimateReadings {
            temperature_c: temperature as f32,
            humidity_pct: humidity as f32,
        }
    }
}

impl ClimateSensor for SyntheticClimate {
    async fn read(&mut self) -> Result<ClimateReadings, SensorError> {
        self.reads += 1;
        if self.fault_every != 0 && self.reads % self.fault_every == 0 {
            return Err(SensorError::ReadFailed {
                sensor: "SHT40",
                operation: "measure",
                details: "simulated I2C NACK",
            });
        }
        Ok(Self::readings_at(seconds_since(self.origin)))
    }
}

/// MQ135 counts wandering between roughly 400 and 1200 ppm.
pub struct SyntheticGas {
    origin: Instant,
}

impl SyntheticGas {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    fn count_at(t: f64) -> u16 {
        let count = 660.0 + 110.0 * (t / 300.0).sin() + 15.0 * (t / 41.0).cos();
        count.clamp(0.0, 4095.0) as u16
    }
}

impl GasSensor for SyntheticGas {
    async fn read_raw(&mut self) -> u16 {
        Self::count_at(seconds_since(self.origin))
    }
}

// ---------------------------------------------------------------------------
// Network link
// ---------------------------------------------------------------------------

/// Time an association takes, standing in for scan + DHCP
const ASSOCIATION_TIME: Duration = Duration::from_millis(300);

/// A Wi-Fi link that refuses the first `failures` associations and then stays
/// up for `uptime` after each successful one. A zero uptime never drops.
pub struct SimulatedLink {
    origin: Instant,
    remaining_failures: u32,
    uptime: Duration,
    associated_at: Option<Instant>,
}

impl SimulatedLink {
    pub fn new(failures: u32, uptime: Duration) -> Self {
        Self {
            origin: Instant::now(),
            remaining_failures: failures,
            uptime,
            associated_at: None,
        }
    }
}

impl Link for SimulatedLink {
    async fn associate(&mut self) -> Result<(), LinkFailure> {
        Timer::after(ASSOCIATION_TIME).await;

        if self.remaining_failures > 0 {
            self.remaining_failures -= 1;
            return Err(LinkFailure::Association(detail(format_args!(
                "simulated AP not in range"
            ))));
        }

        info!("Simulated link associated");
        self.associated_at = Some(Instant::now());
        Ok(())
    }

    fn is_up(&self) -> bool {
        match self.associated_at {
            None => false,
            Some(_) if self.uptime.as_ticks() == 0 => true,
            Some(at) => at.elapsed() < self.uptime,
        }
    }

    fn signal_strength(&self) -> Option<i32> {
        let t = seconds_since(self.origin);
        Some((-62.0 + 12.0 * (t / 90.0).sin()) as i32)
    }
}

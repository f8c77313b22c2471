//! MQ135 gas sensor on ADC1

use embassy_time::{Duration, Timer};
use esp_hal::Blocking;
use esp_hal::analog::adc::{Adc, AdcPin};
use esp_hal::peripherals::{ADC1, GPIO1};
use log::warn;

use atmo_core::sensors::GasSensor;

pub type Mq135Converter = Adc<'static, ADC1<'static>, Blocking>;
pub type Mq135Pin = AdcPin<GPIO1<'static>, ADC1<'static>>;

/// Conversions are retried this many times before the read is reported as 0
const MAX_ATTEMPTS: u8 = 8;
const RETRY_DELAY: Duration = Duration::from_micros(100);

/// Analog output of the MQ135 divider, wired to GPIO1 (ADC1 channel 0).
pub struct Mq135Adc {
    adc: Mq135Converter,
    pin: Mq135Pin,
}

impl Mq135Adc {
    pub fn new(adc: Mq135Converter, pin: Mq135Pin) -> Self {
        Self { adc, pin }
    }
}

impl GasSensor for Mq135Adc {
    async fn read_raw(&mut self) -> u16 {
        for _ in 0..MAX_ATTEMPTS {
            if let Ok(count) = self.adc.read_oneshot(&mut self.pin) {
                return count;
            }
            Timer::after(RETRY_DELAY).await;
        }

        warn!("MQ135 conversion did not complete, reporting 0");
        0
    }
}

//! Gas-sensor calibration
//!
//! Converts raw MQ135 converter counts into a CO₂-equivalent concentration
//! and buckets that concentration into a coarse air-quality index.
//!
//! The conversion follows the usual load-resistor divider model:
//!
//! ```text
//! voltage = count * V_ref / ADC_MAX
//! Rs      = (V_ref * R_L) / voltage - R_L
//! ratio   = Rs / (R_L * clean_air_ratio)
//! ppm     = a * ratio ^ b
//! ```

use serde::{Deserialize, Serialize};

/// Description of the analog-to-digital converter feeding the gas sensor.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct AdcSpec {
    /// Full-scale reference voltage in volts
    pub reference_voltage: f32,
    /// Count reported at full scale
    pub max_count: u16,
}

impl AdcSpec {
    /// ESP32 ADC1 in 12-bit mode with 11 dB attenuation
    pub const ESP32_12BIT: Self = Self {
        reference_voltage: 3.3,
        max_count: 4095,
    };

    /// Voltage corresponding to a raw count. Counts above full scale are clamped.
    #[inline]
    pub fn voltage(&self, count: u16) -> f32 {
        f32::from(count.min(self.max_count)) * self.reference_voltage / f32::from(self.max_count)
    }
}

impl Default for AdcSpec {
    fn default() -> Self {
        Self::ESP32_12BIT
    }
}

/// Curve constants for the MQ-series power-law approximation.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct CalibrationConstants {
    /// Load resistor R_L in kΩ
    pub load_resistance: f32,
    /// Rs/R0 ratio of the sensor in clean air, from the datasheet
    pub clean_air_ratio: f32,
    /// Curve scale `a`
    pub curve_coefficient_a: f32,
    /// Curve exponent `b` (negative: resistance falls as gas rises)
    pub curve_coefficient_b: f32,
}

impl CalibrationConstants {
    /// MQ135 fitted against CO₂ with a 10 kΩ load resistor.
    pub const MQ135_CO2: Self = Self {
        load_resistance: 10.0,
        clean_air_ratio: 9.83,
        curve_coefficient_a: 116.602_07,
        curve_coefficient_b: -2.769_035,
    };
}

impl Default for CalibrationConstants {
    fn default() -> Self {
        Self::MQ135_CO2
    }
}

/// Convert a raw converter count into a gas concentration in ppm.
///
/// A count of zero means zero volts across the load resistor, where the
/// divider model is undefined; that case reports `0.0` rather than failing.
/// At full scale the ratio collapses to zero and the curve diverges, so
/// non-finite results are clamped to `f32::MAX` (worst band, still valid JSON).
pub fn raw_to_concentration(
    adc_count: u16,
    adc: &AdcSpec,
    constants: &CalibrationConstants,
) -> f32 {
    let voltage = adc.voltage(adc_count);
    if voltage <= 0.0 {
        return 0.0;
    }

    let load = constants.load_resistance;
    let sensor_resistance = (adc.reference_voltage * load) / voltage - load;
    let ratio = sensor_resistance / (load * constants.clean_air_ratio);
    let ppm = constants.curve_coefficient_a * libm::powf(ratio, constants.curve_coefficient_b);

    if ppm.is_finite() { ppm } else { f32::MAX }
}

/// Air-quality severity band derived from gas concentration
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AqiBucket {
    /// ≤ 400 ppm
    Good,
    /// ≤ 600 ppm
    Moderate,
    /// ≤ 1000 ppm
    Elevated,
    /// ≤ 1500 ppm
    Poor,
    /// anything above
    Hazardous,
}

impl AqiBucket {
    /// Upper bounds of each band, ascending. Bounds are inclusive.
    const BANDS: [(f32, AqiBucket); 4] = [
        (400.0, AqiBucket::Good),
        (600.0, AqiBucket::Moderate),
        (1000.0, AqiBucket::Elevated),
        (1500.0, AqiBucket::Poor),
    ];

    /// Index value reported on the wire
    pub const fn value(self) -> u16 {
        match self {
            Self::Good => 25,
            Self::Moderate => 50,
            Self::Elevated => 100,
            Self::Poor => 150,
            Self::Hazardous => 200,
        }
    }

    /// Short label for logs
    pub const fn label(self) -> &'static str {
        match self {
            Self::Good => "good",
            Self::Moderate => "moderate",
            Self::Elevated => "elevated",
            Self::Poor => "poor",
            Self::Hazardous => "hazardous",
        }
    }
}

/// Bucket a concentration into an [`AqiBucket`].
///
/// Bands are checked in ascending order and the first inclusive upper bound
/// that holds wins. NaN compares false everywhere and lands in `Hazardous`.
///
/// Temperature and humidity are accepted so callers already pass them, but
/// the current index is concentration-only and ignores both.
pub fn concentration_to_bucket(ppm: f32, _temperature_c: f32, _humidity_pct: f32) -> AqiBucket {
    AqiBucket::BANDS
        .iter()
        .find(|(upper, _)| ppm <= *upper)
        .map(|(_, bucket)| *bucket)
        .unwrap_or(AqiBucket::Hazardous)
}

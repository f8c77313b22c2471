use atmo_core::{
    AdcSpec, AqiBucket, CalibrationConstants, concentration_to_bucket, raw_to_concentration,
};

const ADC: AdcSpec = AdcSpec::ESP32_12BIT;
const MQ135: CalibrationConstants = CalibrationConstants::MQ135_CO2;

#[test]
fn test_mid_scale_count_is_deterministic() {
    let first = raw_to_concentration(2048, &ADC, &MQ135);
    for _ in 0..10 {
        assert_eq!(raw_to_concentration(2048, &ADC, &MQ135), first);
    }

    // Half-scale on a 10 kΩ load puts Rs just under RL, far into the curve's
    // steep end.
    let expected = 65_419.75_f32;
    assert!(
        ((first - expected) / expected).abs() < 1e-3,
        "got {first} ppm"
    );
    assert_eq!(concentration_to_bucket(first, 22.0, 45.0), AqiBucket::Hazardous);
}

#[test]
fn test_typical_indoor_concentrations() {
    assert_eq!(concentration_to_bucket(500.0, 22.0, 45.0), AqiBucket::Moderate);
    assert_eq!(concentration_to_bucket(500.0, 22.0, 45.0).value(), 50);
    assert_eq!(concentration_to_bucket(400.0, 22.0, 45.0).value(), 25);
    assert_eq!(concentration_to_bucket(401.0, 22.0, 45.0).value(), 50);
    assert_eq!(concentration_to_bucket(1500.0, 22.0, 45.0).value(), 150);
    assert_eq!(concentration_to_bucket(1501.0, 22.0, 45.0).value(), 200);
}

#[test]
fn test_disconnected_sensor_reads_zero() {
    assert_eq!(raw_to_concentration(0, &ADC, &MQ135), 0.0);
    assert_eq!(concentration_to_bucket(0.0, 22.0, 45.0), AqiBucket::Good);
}

//! ESP32-S3 firmware-specific modules for atmo-rs
//!
//! This crate contains hardware-specific code that cannot compile on desktop
//! targets: the MQ135 ADC channel, the Wi-Fi station link, the `embassy-net`
//! HTTP transport, and build-time deployment settings.

#![no_std]

extern crate alloc;

pub mod http_transport;
pub mod mq135;
pub mod settings;
pub mod wifi;

pub use http_transport::HttpTransport;
pub use mq135::Mq135Adc;
pub use wifi::WifiLink;

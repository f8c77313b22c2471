//! Hardware-independent core library for atmo-rs
//!
//! This crate contains all platform-agnostic logic for the atmo air-quality
//! telemetry agent: gas-sensor calibration, sensor sampling, the connectivity
//! state machine, reading publication, and the scheduler loop that ties them
//! together.
//!
//! It is `#![no_std]` with `extern crate alloc` so it compiles on both
//! embedded targets (ESP32-S3) and desktop hosts (for the simulator and tests).

#![no_std]

extern crate alloc;

pub mod agent;
pub mod calibration;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod http;
pub mod publisher;
pub mod reading;
pub mod record;
pub mod sampler;
pub mod sensors;

pub use agent::{Agent, AgentStats, Cycle};
pub use calibration::{
    AdcSpec, AqiBucket, CalibrationConstants, concentration_to_bucket, raw_to_concentration,
};
pub use config::AgentConfig;
pub use connectivity::{Ack, ConnectionState, ConnectivityManager, Link, Outbound, Transport};
pub use error::{LinkFailure, PublishError, SamplingFailure, SessionFailure, TransportError};
pub use publisher::Publisher;
pub use reading::{RawSample, Reading, SampleContext};
pub use record::WireFormat;
pub use sampler::Sampler;

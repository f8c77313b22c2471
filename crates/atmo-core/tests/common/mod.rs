//! Instrumented sensors, links and transports shared by the integration tests
#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use atmo_core::error::detail;
use atmo_core::sensors::{ClimateReadings, ClimateSensor, GasSensor, SensorError};
use atmo_core::{Ack, Link, LinkFailure, Outbound, SessionFailure, Transport, TransportError};
use embassy_time::{Duration, Timer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Sample,
    SendStart,
    SendEnd,
}

#[derive(Clone, Default)]
pub struct EventLog(Rc<RefCell<Vec<Event>>>);

impl EventLog {
    pub fn push(&self, event: Event) {
        self.0.borrow_mut().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.borrow().clone()
    }
}

pub struct FakeClimate {
    pub readings: ClimateReadings,
    pub log: EventLog,
}

impl FakeClimate {
    pub fn new(temperature_c: f32, humidity_pct: f32, log: EventLog) -> Self {
        Self {
            readings: ClimateReadings {
                temperature_c,
                humidity_pct,
            },
            log,
        }
    }
}

impl ClimateSensor for FakeClimate {
    async fn read(&mut self) -> Result<ClimateReadings, SensorError> {
        self.log.push(Event::Sample);
        Ok(self.readings)
    }
}

pub struct FakeGas(pub u16);

impl GasSensor for FakeGas {
    async fn read_raw(&mut self) -> u16 {
        self.0
    }
}

pub struct FakeLink {
    pub succeed: bool,
    /// Association never completes
    pub hang: bool,
    pub up: bool,
    pub attempts: u32,
}

impl FakeLink {
    pub fn healthy() -> Self {
        Self {
            succeed: true,
            hang: false,
            up: false,
            attempts: 0,
        }
    }

    pub fn unreachable() -> Self {
        Self {
            succeed: false,
            ..Self::healthy()
        }
    }

    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::healthy()
        }
    }
}

impl Link for FakeLink {
    async fn associate(&mut self) -> Result<(), LinkFailure> {
        self.attempts += 1;
        if self.hang {
            core::future::pending::<()>().await;
        }
        if self.succeed {
            self.up = true;
            Ok(())
        } else {
            Err(LinkFailure::Association(detail(format_args!(
                "AP not found"
            ))))
        }
    }

    fn is_up(&self) -> bool {
        self.up
    }

    fn signal_strength(&self) -> Option<i32> {
        Some(-55)
    }
}

/// How a [`FakeTransport`] answers a send
#[derive(Debug, Clone, Copy)]
pub enum Behaviour {
    Answer(Ack),
    /// Answer after sleeping
    Slow(Ack, Duration),
    /// Never answer
    Hang,
}

pub struct FakeTransport {
    pub behaviour: Behaviour,
    /// Handshake never completes
    pub hang_connect: bool,
    pub connected: bool,
    pub sends: u32,
    pub bodies: Vec<Vec<u8>>,
    pub log: EventLog,
}

impl FakeTransport {
    pub fn new(behaviour: Behaviour, log: EventLog) -> Self {
        Self {
            behaviour,
            hang_connect: false,
            connected: false,
            sends: 0,
            bodies: Vec::new(),
            log,
        }
    }
}

impl Transport for FakeTransport {
    async fn connect(&mut self) -> Result<(), SessionFailure> {
        if self.hang_connect {
            core::future::pending::<()>().await;
        }
        self.connected = true;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }

    async fn send(&mut self, message: Outbound<'_>) -> Result<Ack, TransportError> {
        self.sends += 1;
        let body = match message {
            Outbound::Post { body, .. } => body,
            Outbound::Publish { payload, .. } => payload,
        };
        self.bodies.push(body.to_vec());
        self.log.push(Event::SendStart);

        let ack = match self.behaviour {
            Behaviour::Answer(ack) => ack,
            Behaviour::Slow(ack, delay) => {
                Timer::after(delay).await;
                ack
            }
            Behaviour::Hang => core::future::pending().await,
        };

        self.log.push(Event::SendEnd);
        Ok(ack)
    }
}

mod common;

use atmo_core::connectivity::ConnectivitySettings;
use atmo_core::{
    Ack, AdcSpec, Agent, CalibrationConstants, ConnectionState, ConnectivityManager, Cycle,
    PublishError, Publisher, SamplingFailure, Sampler, WireFormat,
};
use common::{Behaviour, Event, EventLog, FakeClimate, FakeGas, FakeLink, FakeTransport};
use embassy_futures::block_on;
use embassy_time::Duration;

type TestAgent = Agent<FakeClimate, FakeGas, FakeLink, FakeTransport>;

fn agent(
    temperature_c: f32,
    link: FakeLink,
    behaviour: Behaviour,
    sampling_interval: Duration,
    log: &EventLog,
) -> TestAgent {
    let sampler = Sampler::new(
        FakeClimate::new(temperature_c, 45.0, log.clone()),
        FakeGas(700),
        "atmo-01",
        AdcSpec::ESP32_12BIT,
        CalibrationConstants::MQ135_CO2,
    );
    let settings = ConnectivitySettings {
        link_timeout: Duration::from_millis(200),
        session_timeout: Duration::from_millis(200),
        backoff_base: Duration::from_ticks(0),
        backoff_max: Duration::from_ticks(0),
    };
    let connection =
        ConnectivityManager::new(link, FakeTransport::new(behaviour, log.clone()), settings);
    let publisher = Publisher::new(WireFormat::Http, None, "", Duration::from_secs(1));

    Agent::new(
        sampler,
        connection,
        publisher,
        sampling_interval,
        Duration::from_millis(1),
    )
}

#[test]
fn test_cycles_never_overlap() {
    let log = EventLog::default();
    let slow = Behaviour::Slow(Ack::Status(201), Duration::from_millis(20));
    let mut agent = agent(22.0, FakeLink::healthy(), slow, Duration::from_ticks(0), &log);

    for _ in 0..4 {
        assert_eq!(block_on(agent.tick()), Cycle::Delivered);
    }

    let expected: Vec<Event> = [Event::Sample, Event::SendStart, Event::SendEnd]
        .into_iter()
        .cycle()
        .take(12)
        .collect();
    assert_eq!(log.events(), expected);
    assert_eq!(agent.stats().delivered, 4);
}

#[test]
fn test_sampling_waits_for_interval() {
    let log = EventLog::default();
    let mut agent = agent(
        22.0,
        FakeLink::healthy(),
        Behaviour::Answer(Ack::Status(201)),
        Duration::from_secs(60),
        &log,
    );

    assert_eq!(block_on(agent.tick()), Cycle::Delivered);
    for _ in 0..3 {
        assert_eq!(block_on(agent.tick()), Cycle::Idle);
    }
    assert_eq!(agent.connection().transport().sends, 1);
    assert_eq!(agent.stats().cycles, 1);
}

#[test]
fn test_invalid_temperature_skips_publish() {
    let log = EventLog::default();
    let mut agent = agent(
        f32::NAN,
        FakeLink::healthy(),
        Behaviour::Answer(Ack::Status(201)),
        Duration::from_ticks(0),
        &log,
    );

    assert_eq!(
        block_on(agent.tick()),
        Cycle::SamplingFailed(SamplingFailure::InvalidTemperature)
    );
    assert_eq!(agent.connection().transport().sends, 0);
    assert_eq!(agent.connection().link().attempts, 0);
    assert_eq!(agent.stats().sampling_failures, 1);
}

#[test]
fn test_loop_survives_unreachable_network() {
    let log = EventLog::default();
    let mut agent = agent(
        22.0,
        FakeLink::unreachable(),
        Behaviour::Answer(Ack::Status(201)),
        Duration::from_ticks(0),
        &log,
    );

    for attempt in 1..=3 {
        let cycle = block_on(agent.tick());
        assert!(matches!(cycle, Cycle::PublishFailed(PublishError::Link(_))));
        assert_eq!(agent.connection().state(), ConnectionState::Disconnected);
        assert_eq!(agent.connection().backoff().failures(), attempt);
    }

    assert_eq!(agent.connection().transport().sends, 0);
    assert_eq!(agent.stats().connectivity_failures, 3);
    assert_eq!(log.events(), vec![Event::Sample; 3]);
}

#[test]
fn test_rejected_reading_is_dropped() {
    let log = EventLog::default();
    let mut agent = agent(
        22.0,
        FakeLink::healthy(),
        Behaviour::Answer(Ack::Status(500)),
        Duration::from_ticks(0),
        &log,
    );

    assert_eq!(
        block_on(agent.tick()),
        Cycle::PublishFailed(PublishError::Rejected(500))
    );
    assert_eq!(agent.connection().transport().sends, 1);
    assert_eq!(
        block_on(agent.tick()),
        Cycle::PublishFailed(PublishError::Rejected(500))
    );
    assert_eq!(agent.connection().transport().sends, 2);
    assert_eq!(agent.stats().rejected, 2);
}

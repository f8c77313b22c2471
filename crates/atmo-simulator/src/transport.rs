//! Host transports: a real HTTP client, a real MQTT broker session and a
//! collector that only logs what it receives.
//!
//! The agent runs on a single-threaded executor and both clients block, so
//! neither can lean on the scheduler's timeout. Each enforces the network
//! budget itself, across the whole exchange.

use std::time::{Duration as StdDuration, Instant as StdInstant};

use embassy_time::Duration;
use log::{debug, info, warn};
use reqwest::blocking::Client as HttpClient;
use reqwest::header::CONTENT_TYPE;
use rumqttc::{
    Client as MqttClient, Connection, ConnectionError, Event, MqttOptions, Outgoing, Packet, QoS,
    RecvTimeoutError,
};

use atmo_core::config::BusConfig;
use atmo_core::error::detail;
use atmo_core::http::{API_KEY_HEADER, Endpoint};
use atmo_core::{Ack, Outbound, SessionFailure, Transport, TransportError, WireFormat};

fn std_duration(duration: Duration) -> StdDuration {
    StdDuration::from_millis(duration.as_millis())
}

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

fn request_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Io(detail(format_args!("{}", e)))
    }
}

/// HTTP/1.1 client whose request timeout covers resolution, connect, upload
/// and the response head.
pub struct HttpTransport {
    url: String,
    timeout: StdDuration,
    client: Option<HttpClient>,
}

impl HttpTransport {
    pub fn new(endpoint: &Endpoint<'_>, timeout: Duration) -> Self {
        Self {
            url: format!("http://{}:{}{}", endpoint.host, endpoint.port, endpoint.path),
            timeout: std_duration(timeout),
            client: None,
        }
    }
}

impl Transport for HttpTransport {
    async fn connect(&mut self) -> Result<(), SessionFailure> {
        let client = HttpClient::builder()
            .timeout(self.timeout)
            .connect_timeout(self.timeout)
            .build()
            .map_err(|e| SessionFailure::Handshake(detail(format_args!("{}", e))))?;

        debug!("HTTP client ready for {}", self.url);
        self.client = Some(client);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    fn disconnect(&mut self) {
        self.client = None;
    }

    async fn send(&mut self, message: Outbound<'_>) -> Result<Ack, TransportError> {
        let client = self.client.as_ref().ok_or(TransportError::NoSession)?;
        let Outbound::Post { body, api_key } = message else {
            return Err(TransportError::Unsupported);
        };

        let mut request = client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_vec());
        if let Some(key) = api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let response = request.send().map_err(request_error)?;
        Ok(Ack::Status(response.status().as_u16()))
    }
}

// ---------------------------------------------------------------------------
// MQTT
// ---------------------------------------------------------------------------

const KEEP_ALIVE: StdDuration = StdDuration::from_secs(30);

/// Pending requests the client may queue ahead of the event loop
const REQUEST_CAPACITY: usize = 10;

/// Longest a keep-alive service call may spend driving the event loop
const SERVICE_SLICE: StdDuration = StdDuration::from_millis(20);

/// What one turn of the event loop produced before `deadline`.
enum Pump {
    Event(Event),
    Failed(ConnectionError),
    Elapsed,
    Closed,
}

fn pump(connection: &mut Connection, deadline: StdInstant) -> Pump {
    let remaining = deadline.saturating_duration_since(StdInstant::now());
    if remaining.is_zero() {
        return Pump::Elapsed;
    }
    match connection.recv_timeout(remaining) {
        Ok(Ok(event)) => Pump::Event(event),
        Ok(Err(e)) => Pump::Failed(e),
        Err(RecvTimeoutError::Timeout) => Pump::Elapsed,
        Err(RecvTimeoutError::Disconnected) => Pump::Closed,
    }
}

fn event_loop_closed() -> TransportError {
    TransportError::Io(detail(format_args!("event loop closed")))
}

struct BrokerSession {
    client: MqttClient,
    connection: Connection,
}

/// MQTT 3.1.1 session to the configured broker. Publishes go out at QoS 0
/// and count as delivered once written to the socket.
pub struct MqttTransport {
    options: MqttOptions,
    timeout: StdDuration,
    session: Option<BrokerSession>,
}

impl MqttTransport {
    pub fn new(bus: &BusConfig<'_>, timeout: Duration) -> Self {
        let client_id = match bus.client_id.trim() {
            "" => "atmo-sim",
            id => id,
        };
        let mut options = MqttOptions::new(client_id, bus.host, bus.port);
        options.set_keep_alive(KEEP_ALIVE);
        options.set_clean_session(true);
        if let Some(username) = bus.username {
            options.set_credentials(username, bus.password.unwrap_or_default());
        }

        Self {
            options,
            timeout: std_duration(timeout),
            session: None,
        }
    }
}

impl Transport for MqttTransport {
    async fn connect(&mut self) -> Result<(), SessionFailure> {
        let (client, mut connection) = MqttClient::new(self.options.clone(), REQUEST_CAPACITY);
        let deadline = StdInstant::now() + self.timeout;

        loop {
            match pump(&mut connection, deadline) {
                Pump::Event(Event::Incoming(Packet::ConnAck(ack))) => {
                    info!(
                        "Broker session open (session present: {})",
                        ack.session_present
                    );
                    break;
                }
                Pump::Event(event) => debug!("MQTT event before CONNACK: {:?}", event),
                Pump::Failed(ConnectionError::ConnectionRefused(code)) => {
                    return Err(SessionFailure::Handshake(detail(format_args!(
                        "broker refused: {:?}",
                        code
                    ))));
                }
                Pump::Failed(e) => {
                    return Err(SessionFailure::Handshake(detail(format_args!("{}", e))));
                }
                Pump::Elapsed => return Err(SessionFailure::Timeout),
                Pump::Closed => {
                    return Err(SessionFailure::Handshake(detail(format_args!(
                        "event loop closed"
                    ))));
                }
            }
        }

        self.session = Some(BrokerSession { client, connection });
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    fn disconnect(&mut self) {
        if let Some(session) = self.session.take() {
            let _ = session.client.try_disconnect();
        }
    }

    async fn send(&mut self, message: Outbound<'_>) -> Result<Ack, TransportError> {
        let session = self.session.as_mut().ok_or(TransportError::NoSession)?;
        let Outbound::Publish { topic, payload } = message else {
            return Err(TransportError::Unsupported);
        };

        session
            .client
            .try_publish(topic, QoS::AtMostOnce, false, payload.to_vec())
            .map_err(|e| {
                warn!("Publish not queued: {}", e);
                TransportError::Refused
            })?;

        let deadline = StdInstant::now() + self.timeout;
        loop {
            match pump(&mut session.connection, deadline) {
                Pump::Event(Event::Outgoing(Outgoing::Publish(_))) => return Ok(Ack::Published),
                Pump::Event(event) => debug!("MQTT event while publishing: {:?}", event),
                Pump::Failed(e) => return Err(TransportError::Io(detail(format_args!("{}", e)))),
                Pump::Elapsed => return Err(TransportError::Timeout),
                Pump::Closed => return Err(event_loop_closed()),
            }
        }
    }

    /// Drive the event loop briefly so pings go out and inbound packets are
    /// drained between cycles.
    async fn service(&mut self) -> Result<(), TransportError> {
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };

        let deadline = StdInstant::now() + SERVICE_SLICE;
        loop {
            match pump(&mut session.connection, deadline) {
                Pump::Event(event) => debug!("MQTT event: {:?}", event),
                Pump::Elapsed => return Ok(()),
                Pump::Failed(e) => return Err(TransportError::Io(detail(format_args!("{}", e)))),
                Pump::Closed => return Err(event_loop_closed()),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Log-only collector
// ---------------------------------------------------------------------------

/// Accepts everything and prints the record.
pub struct LogCollector {
    format: WireFormat,
    connected: bool,
    received: u32,
}

impl LogCollector {
    pub fn new(format: WireFormat) -> Self {
        Self {
            format,
            connected: false,
            received: 0,
        }
    }
}

impl Transport for LogCollector {
    async fn connect(&mut self) -> Result<(), SessionFailure> {
        info!("Log collector session opened ({:?})", self.format);
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
        self.received += 1;
        match message {
            Outbound::Post { body, .. } => {
                info!("#{} POST {}", self.received, String::from_utf8_lossy(body));
                Ok(Ack::Status(201))
            }
            Outbound::Publish { topic, payload } => {
                info!(
                    "#{} PUBLISH {} {}",
                    self.received,
                    topic,
                    String::from_utf8_lossy(payload)
                );
                Ok(Ack::Published)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub enum SimTransport {
    Http(HttpTransport),
    Mqtt(MqttTransport),
    Log(LogCollector),
}

impl Transport for SimTransport {
    async fn connect(&mut self) -> Result<(), SessionFailure> {
        match self {
            Self::Http(t) => t.connect().await,
            Self::Mqtt(t) => t.connect().await,
            Self::Log(t) => t.connect().await,
        }
    }

    fn is_connected(&self) -> bool {
        match self {
            Self::Http(t) => t.is_connected(),
            Self::Mqtt(t) => t.is_connected(),
            Self::Log(t) => t.is_connected(),
        }
    }

    fn disconnect(&mut self) {
        match self {
            Self::Http(t) => t.disconnect(),
            Self::Mqtt(t) => t.disconnect(),
            Self::Log(t) => t.disconnect(),
        }
    }

    async fn send(&mut self, message: Outbound<'_>) -> Result<Ack, TransportError> {
        match self {
            Self::Http(t) => t.send(message).await,
            Self::Mqtt(t) => t.send(message).await,
            Self::Log(t) => t.send(message).await,
        }
    }

    async fn service(&mut self) -> Result<(), TransportError> {
        match self {
            Self::Mqtt(t) => t.service().await,
            Self::Http(_) | Self::Log(_) => Ok(()),
        }
    }
}

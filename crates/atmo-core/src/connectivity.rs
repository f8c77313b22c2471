//! Connectivity lifecycle
//!
//! Delivery needs two layers to be up: the network link (Wi-Fi association
//! plus an address) and an application session on top of it (a resolved
//! collector for HTTP, a broker connection for the message bus). The
//! [`ConnectivityManager`] owns both and walks them through
//!
//! ```text
//! Disconnected --ensure_up--> LinkUp --ensure_session--> SessionActive
//!      ^                        ^  |                          |
//!      |                        |  +---- session lost --------+
//!      +------- link lost ------+-----------------------------+
//! ```
//!
//! Every call into the link or transport is bounded by a timeout so a hung
//! network stack can only ever cost one budget per cycle.

use embassy_time::{Duration, Instant, with_timeout};
use log::{debug, info, warn};

use crate::config::AgentConfig;
use crate::error::{LinkFailure, SessionFailure, TransportError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No network association
    Disconnected,
    /// Link associated, no application session
    LinkUp,
    /// Ready to deliver
    SessionActive,
}

/// Network association, e.g. a Wi-Fi station interface.
pub trait Link {
    /// Try to associate with the network and obtain an address.
    fn associate(&mut self) -> impl Future<Output = Result<(), LinkFailure>>;

    /// Whether the link is currently associated.
    fn is_up(&self) -> bool;

    /// Received signal strength in dBm, when the link can report it.
    fn signal_strength(&self) -> Option<i32> {
        None
    }
}

/// One message handed to a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outbound<'a> {
    /// HTTP POST of a JSON body, with the collector API key if configured
    Post {
        body: &'a [u8],
        api_key: Option<&'a str>,
    },
    /// Message-bus publish of a JSON payload to a topic
    Publish { topic: &'a str, payload: &'a [u8] },
}

/// Application-level answer to a send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    /// HTTP status code returned by the collector
    Status(u16),
    /// The message bus accepted the publish
    Published,
}

/// Application session and delivery, layered on a [`Link`].
pub trait Transport {
    /// Establish the session (DNS, TCP/TLS, broker CONNECT, ...).
    fn connect(&mut self) -> impl Future<Output = Result<(), SessionFailure>>;

    /// Whether the session is still usable.
    fn is_connected(&self) -> bool;

    /// Forget the session. Must not block.
    fn disconnect(&mut self);

    /// Send one message and wait for its answer.
    fn send(&mut self, message: Outbound<'_>) -> impl Future<Output = Result<Ack, TransportError>>;

    /// Background work owed to the session (keep-alives, inbound packets).
    /// Must return promptly when there is nothing to do.
    fn service(&mut self) -> impl Future<Output = Result<(), TransportError>> {
        async { Ok(()) }
    }
}

/// Timing knobs for the connectivity manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectivitySettings {
    /// Budget for one association attempt
    pub link_timeout: Duration,
    /// Budget for one session handshake or service call
    pub session_timeout: Duration,
    /// Delay after the first failed association. Zero disables pacing.
    pub backoff_base: Duration,
    /// Ceiling for the association retry delay
    pub backoff_max: Duration,
}

impl Default for ConnectivitySettings {
    fn default() -> Self {
        Self {
            link_timeout: Duration::from_secs(10),
            session_timeout: Duration::from_secs(10),
            backoff_base: Duration::from_secs(5),
            backoff_max: Duration::from_secs(300),
        }
    }
}

impl From<&AgentConfig<'_>> for ConnectivitySettings {
    fn from(config: &AgentConfig<'_>) -> Self {
        Self {
            link_timeout: config.network_timeout(),
            session_timeout: config.network_timeout(),
            backoff_base: Duration::from_millis(config.backoff_base_ms),
            backoff_max: Duration::from_millis(config.backoff_max_ms),
        }
    }
}

/// Paces association retries after consecutive failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    failures: u32,
    last_attempt: Option<Instant>,
    base: Duration,
    max: Duration,
}

impl Backoff {
    pub const fn new(base: Duration, max: Duration) -> Self {
        Self {
            failures: 0,
            last_attempt: None,
            base,
            max,
        }
    }

    /// Consecutive failed attempts since the last success
    pub const fn failures(&self) -> u32 {
        self.failures
    }

    /// Delay required between the last attempt and the next one:
    /// `base * 2^(failures - 1)`, capped at `max`.
    pub fn delay(&self) -> Duration {
        if self.failures == 0 {
            return Duration::from_ticks(0);
        }
        let factor = 1_u64.checked_shl(self.failures - 1).unwrap_or(u64::MAX);
        let ticks = self.base.as_ticks().saturating_mul(factor);
        Duration::from_ticks(ticks.min(self.max.as_ticks()))
    }

    /// Time left before another attempt is permitted, if any.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        let last = self.last_attempt?;
        let elapsed = now.saturating_duration_since(last);
        let delay = self.delay();
        (elapsed < delay).then(|| delay - elapsed)
    }

    fn record_attempt(&mut self, now: Instant) {
        self.last_attempt = Some(now);
    }

    fn record_failure(&mut self) {
        self.failures = self.failures.saturating_add(1);
    }

    fn reset(&mut self) {
        self.failures = 0;
    }
}

/// Owns the link, the transport and the state machine over them.
pub struct ConnectivityManager<L, T> {
    link: L,
    transport: T,
    state: ConnectionState,
    backoff: Backoff,
    settings: ConnectivitySettings,
}

impl<L: Link, T: Transport> ConnectivityManager<L, T> {
    pub fn new(link: L, transport: T, settings: ConnectivitySettings) -> Self {
        Self {
            link,
            transport,
            state: ConnectionState::Disconnected,
            backoff: Backoff::new(settings.backoff_base, settings.backoff_max),
            settings,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Signal strength of the current link, `None` while disconnected.
    pub fn signal_strength(&self) -> Option<i32> {
        match self.state {
            ConnectionState::Disconnected => None,
            _ => self.link.signal_strength(),
        }
    }

    /// Drop to `Disconnected` if the link went away underneath us.
    pub fn check_health(&mut self) -> ConnectionState {
        if self.state != ConnectionState::Disconnected && !self.link.is_up() {
            warn!("Link lost in state {:?}, dropping session", self.state);
            self.transport.disconnect();
            self.state = ConnectionState::Disconnected;
        }
        self.state
    }

    /// Bring the link up if it is not already.
    ///
    /// While disconnected, attempts are paced by the backoff; an attempt that
    /// is not yet permitted returns [`LinkFailure::BackingOff`] without
    /// touching the link.
    pub async fn ensure_up(&mut self) -> Result<(), LinkFailure> {
        if self.check_health() != ConnectionState::Disconnected {
            return Ok(());
        }

        let now = Instant::now();
        if let Some(remaining) = self.backoff.remaining(now) {
            debug!(
                "Association deferred, {} ms of backoff left after {} failures",
                remaining.as_millis(),
                self.backoff.failures()
            );
            return Err(LinkFailure::BackingOff {
                remaining_ms: remaining.as_millis(),
            });
        }

        self.backoff.record_attempt(now);
        let result = match with_timeout(self.settings.link_timeout, self.link.associate()).await {
            Ok(result) => result,
            Err(_) => Err(LinkFailure::Timeout),
        };

        match result {
            Ok(()) => {
                info!("Link up");
                self.backoff.reset();
                self.state = ConnectionState::LinkUp;
                Ok(())
            }
            Err(e) => {
                self.backoff.record_failure();
                warn!(
                    "Link association failed ({} in a row): {}",
                    self.backoff.failures(),
                    e
                );
                Err(e)
            }
        }
    }

    /// Establish the application session if it is not already active.
    pub async fn ensure_session(&mut self) -> Result<(), SessionFailure> {
        match self.state {
            ConnectionState::Disconnected => return Err(SessionFailure::LinkDown),
            ConnectionState::SessionActive if self.transport.is_connected() => return Ok(()),
            ConnectionState::SessionActive => {
                warn!("Session closed by peer, reconnecting");
                self.transport.disconnect();
                self.state = ConnectionState::LinkUp;
            }
            ConnectionState::LinkUp => {}
        }

        match with_timeout(self.settings.session_timeout, self.transport.connect()).await {
            Ok(Ok(())) => {
                info!("Session established");
                self.state = ConnectionState::SessionActive;
                Ok(())
            }
            Ok(Err(e)) => {
                warn!("Session connect failed: {}", e);
                self.transport.disconnect();
                Err(e)
            }
            Err(_) => {
                warn!("Session connect timed out");
                self.transport.disconnect();
                Err(SessionFailure::Timeout)
            }
        }
    }

    /// Give the session its background time slice. Never waits longer than
    /// the session budget; an error or timeout drops the session.
    pub async fn service(&mut self) {
        if self.state != ConnectionState::SessionActive {
            return;
        }

        let error = match with_timeout(self.settings.session_timeout, self.transport.service()).await
        {
            Ok(Ok(())) => return,
            Ok(Err(e)) => e,
            Err(_) => TransportError::Timeout,
        };
        warn!("Session service failed: {}", error);
        self.drop_session();
    }

    /// Send one message over the active session within `budget`.
    ///
    /// Any transport-level failure invalidates the session so the next cycle
    /// handshakes again.
    pub async fn send(
        &mut self,
        message: Outbound<'_>,
        budget: Duration,
    ) -> Result<Ack, TransportError> {
        if self.state != ConnectionState::SessionActive {
            return Err(TransportError::NoSession);
        }

        let error = match with_timeout(budget, self.transport.send(message)).await {
            Ok(Ok(ack)) => return Ok(ack),
            Ok(Err(e)) => e,
            Err(_) => TransportError::Timeout,
        };
        self.drop_session();
        Err(error)
    }

    /// Forget the session but keep the link.
    pub fn drop_session(&mut self) {
        if self.state == ConnectionState::SessionActive {
            self.transport.disconnect();
            self.state = ConnectionState::LinkUp;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::detail;
    use core::cell::Cell;
    use embassy_futures::block_on;

    struct ScriptedLink {
        up: Cell<bool>,
        succeed: bool,
        attempts: u32,
        rssi: Option<i32>,
    }

    impl ScriptedLink {
        fn new(succeed: bool) -> Self {
            Self {
                up: Cell::new(false),
                succeed,
                attempts: 0,
                rssi: Some(-64),
            }
        }
    }

    impl Link for ScriptedLink {
        async fn associate(&mut self) -> Result<(), LinkFailure> {
            self.attempts += 1;
            if self.succeed {
                self.up.set(true);
                Ok(())
            } else {
                Err(LinkFailure::Association(detail(format_args!("no AP"))))
            }
        }

        fn is_up(&self) -> bool {
            self.up.get()
        }

        fn signal_strength(&self) -> Option<i32> {
            self.rssi
        }
    }

    #[derive(Default)]
    struct ScriptedTransport {
        refuse_connect: bool,
        connected: bool,
        connects: u32,
        disconnects: u32,
        service_error: bool,
    }

    impl Transport for ScriptedTransport {
        async fn connect(&mut self) -> Result<(), SessionFailure> {
            self.connects += 1;
            if self.refuse_connect {
                Err(SessionFailure::Handshake(detail(format_args!("bad credentials"))))
            } else {
                self.connected = true;
                Ok(())
            }
        }

        fn is_connected(&self) -> bool {
            self.connected
        }

        fn disconnect(&mut self) {
            self.disconnects += 1;
            self.connected = false;
        }

        async fn send(&mut self, _message: Outbound<'_>) -> Result<Ack, TransportError> {
            Ok(Ack::Status(200))
        }

        async fn service(&mut self) -> Result<(), TransportError> {
            if self.service_error {
                Err(TransportError::Io(detail(format_args!("keep-alive lost"))))
            } else {
                Ok(())
            }
        }
    }

    fn unpaced() -> ConnectivitySettings {
        ConnectivitySettings {
            backoff_base: Duration::from_ticks(0),
            ..ConnectivitySettings::default()
        }
    }

    #[test]
    fn test_full_bring_up() {
        let mut manager = ConnectivityManager::new(
            ScriptedLink::new(true),
            ScriptedTransport::default(),
            unpaced(),
        );
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert_eq!(manager.signal_strength(), None);

        block_on(manager.ensure_up()).unwrap();
        assert_eq!(manager.state(), ConnectionState::LinkUp);

        block_on(manager.ensure_session()).unwrap();
        assert_eq!(manager.state(), ConnectionState::SessionActive);
        assert_eq!(manager.signal_strength(), Some(-64));

        // Already up: no further attempts
        block_on(manager.ensure_up()).unwrap();
        block_on(manager.ensure_session()).unwrap();
        assert_eq!(manager.link().attempts, 1);
        assert_eq!(manager.transport().connects, 1);
    }

    #[test]
    fn test_session_requires_link() {
        let mut manager = ConnectivityManager::new(
            ScriptedLink::new(true),
            ScriptedTransport::default(),
            unpaced(),
        );
        assert_eq!(
            block_on(manager.ensure_session()),
            Err(SessionFailure::LinkDown)
        );
        assert_eq!(manager.transport().connects, 0);
    }

    #[test]
    fn test_session_failure_stays_link_up() {
        let transport = ScriptedTransport {
            refuse_connect: true,
            ..Default::default()
        };
        let mut manager = ConnectivityManager::new(ScriptedLink::new(true), transport, unpaced());

        block_on(manager.ensure_up()).unwrap();
        let result = block_on(manager.ensure_session());

        assert!(matches!(result, Err(SessionFailure::Handshake(_))));
        assert_eq!(manager.state(), ConnectionState::LinkUp);
    }

    #[test]
    fn test_link_loss_drops_to_disconnected() {
        let mut manager = ConnectivityManager::new(
            ScriptedLink::new(true),
            ScriptedTransport::default(),
            unpaced(),
        );
        block_on(manager.ensure_up()).unwrap();
        block_on(manager.ensure_session()).unwrap();

        manager.link().up.set(false);

        assert_eq!(manager.check_health(), ConnectionState::Disconnected);
        assert!(!manager.transport().is_connected());
        assert_eq!(manager.transport().disconnects, 1);
    }

    #[test]
    fn test_dead_session_is_reestablished() {
        let mut manager = ConnectivityManager::new(
            ScriptedLink::new(true),
            ScriptedTransport::default(),
            unpaced(),
        );
        block_on(manager.ensure_up()).unwrap();
        block_on(manager.ensure_session()).unwrap();

        manager.transport.connected = false;
        block_on(manager.ensure_session()).unwrap();

        assert_eq!(manager.state(), ConnectionState::SessionActive);
        assert_eq!(manager.transport().connects, 2);
    }

    #[test]
    fn test_service_error_drops_session() {
        let mut manager = ConnectivityManager::new(
            ScriptedLink::new(true),
            ScriptedTransport::default(),
            unpaced(),
        );
        block_on(manager.ensure_up()).unwrap();
        block_on(manager.ensure_session()).unwrap();

        manager.transport.service_error = true;
        block_on(manager.service());

        assert_eq!(manager.state(), ConnectionState::LinkUp);
    }

    #[test]
    fn test_send_without_session() {
        let mut manager = ConnectivityManager::new(
            ScriptedLink::new(true),
            ScriptedTransport::default(),
            unpaced(),
        );
        let message = Outbound::Post {
            body: b"{}",
            api_key: None,
        };
        assert_eq!(
            block_on(manager.send(message, Duration::from_secs(1))),
            Err(TransportError::NoSession)
        );
    }

    #[test]
    fn test_backoff_gates_attempts() {
        let settings = ConnectivitySettings {
            backoff_base: Duration::from_secs(3600),
            ..ConnectivitySettings::default()
        };
        let mut manager =
            ConnectivityManager::new(ScriptedLink::new(false), ScriptedTransport::default(), settings);

        assert!(matches!(
            block_on(manager.ensure_up()),
            Err(LinkFailure::Association(_))
        ));
        assert!(matches!(
            block_on(manager.ensure_up()),
            Err(LinkFailure::BackingOff { .. })
        ));
        assert_eq!(manager.link().attempts, 1);
        assert_eq!(manager.backoff().failures(), 1);
    }

    #[test]
    fn test_backoff_delay_doubles_and_caps() {
        let mut backoff = Backoff::new(Duration::from_secs(2), Duration::from_secs(30));
        assert_eq!(backoff.delay(), Duration::from_ticks(0));

        let expected = [2, 4, 8, 16, 30, 30];
        for secs in expected {
            backoff.record_failure();
            assert_eq!(backoff.delay(), Duration::from_secs(secs));
        }

        for _ in 0..100 {
            backoff.record_failure();
        }
        assert_eq!(backoff.delay(), Duration::from_secs(30));

        backoff.reset();
        assert_eq!(backoff.failures(), 0);
    }

    #[test]
    fn test_backoff_remaining() {
        let mut backoff = Backoff::new(Duration::from_secs(10), Duration::from_secs(60));
        let start = Instant::from_secs(100);
        assert_eq!(backoff.remaining(start), None);

        backoff.record_attempt(start);
        backoff.record_failure();

        assert_eq!(
            backoff.remaining(Instant::from_secs(104)),
            Some(Duration::from_secs(6))
        );
        assert_eq!(backoff.remaining(Instant::from_secs(110)), None);
    }
}

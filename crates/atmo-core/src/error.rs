//! Failure taxonomy for the agent
//!
//! None of these are fatal. Each one is logged by the agent and the cycle that
//! produced it is skipped; the next cadence tick is the only retry.

use core::fmt::Write;

use thiserror_no_std::Error;

/// Short human-readable detail carried by driver-level failures
pub type Detail = heapless::String<64>;

/// Render a detail message. Fragments that would overflow the buffer are dropped.
pub fn detail(args: core::fmt::Arguments<'_>) -> Detail {
    let mut out = Detail::new();
    let _ = out.write_fmt(args);
    out
}

/// A sensor read produced a value that cannot go into a reading.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingFailure {
    #[error("temperature reading is not a number")]
    InvalidTemperature,
    #[error("humidity reading is not a number")]
    InvalidHumidity,
}

/// Network association (Wi-Fi, Ethernet) could not be brought up.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkFailure {
    #[error("association failed: {0}")]
    Association(Detail),
    #[error("association timed out")]
    Timeout,
    #[error("retry deferred for another {remaining_ms} ms")]
    BackingOff { remaining_ms: u64 },
}

/// The application session on top of the link could not be established.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionFailure {
    #[error("link is not up")]
    LinkDown,
    #[error("handshake failed: {0}")]
    Handshake(Detail),
    #[error("handshake timed out")]
    Timeout,
}

/// A single send did not produce an application-level answer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("no active session")]
    NoSession,
    #[error("I/O failed: {0}")]
    Io(Detail),
    #[error("publish refused by session")]
    Refused,
    #[error("malformed response")]
    MalformedResponse,
    #[error("message kind not supported by this transport")]
    Unsupported,
    #[error("timed out")]
    Timeout,
}

/// Why a reading was not delivered this cycle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    #[error("link unavailable: {0}")]
    Link(LinkFailure),
    #[error("session unavailable: {0}")]
    Session(SessionFailure),
    #[error("collector rejected reading with status {0}")]
    Rejected(u16),
    #[error("transport failure: {0}")]
    Transport(TransportError),
    #[error("reading could not be encoded")]
    Encode,
}

impl PublishError {
    /// Whether the failure happened before anything was sent.
    pub const fn is_connectivity(&self) -> bool {
        matches!(self, Self::Link(_) | Self::Session(_))
    }
}

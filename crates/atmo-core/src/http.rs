//! Minimal HTTP/1.1 framing for the ingest endpoint
//!
//! Transports only need two things from HTTP: writing a single `POST` with a
//! JSON body, and pulling the status code out of the response. Everything
//! after the status line is ignored and the connection is closed.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::Write;

/// Header carrying the collector API key
pub const API_KEY_HEADER: &str = "x-api-key";

/// Where readings are POSTed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint<'a> {
    pub host: &'a str,
    pub port: u16,
    pub path: &'a str,
}

impl Endpoint<'_> {
    /// Value of the `Host` header; the port is omitted when it is 80.
    fn host_header(&self) -> String {
        let mut host = String::from(self.host);
        if self.port != 80 {
            let _ = write!(host, ":{}", self.port);
        }
        host
    }
}

/// Build a complete `POST` request (head and body) for a JSON payload.
pub fn post_request(endpoint: &Endpoint<'_>, api_key: Option<&str>, body: &[u8]) -> Vec<u8> {
    let mut head = String::with_capacity(160);
    let _ = write!(
        head,
        "POST {} HTTP/1.1\r\nHost: {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\n",
        endpoint.path,
        endpoint.host_header(),
        body.len()
    );
    if let Some(key) = api_key {
        let _ = write!(head, "{}: {}\r\n", API_KEY_HEADER, key);
    }
    head.push_str("Connection: close\r\n\r\n");

    let mut request = Vec::with_capacity(head.len() + body.len());
    request.extend_from_slice(head.as_bytes());
    request.extend_from_slice(body);
    request
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLineError {
    /// No complete status line yet; read more bytes
    Incomplete,
    /// The response does not start with a valid `HTTP/1.x NNN` line
    Malformed,
}

/// Parse the status code from the start of a response.
pub fn parse_status(response: &[u8]) -> Result<u16, StatusLineError> {
    let line_end = response
        .windows(2)
        .position(|w| w == b"\r\n")
        .ok_or(StatusLineError::Incomplete)?;
    let line = core::str::from_utf8(&response[..line_end]).map_err(|_| StatusLineError::Malformed)?;

    let mut parts = line.splitn(3, ' ');
    let version = parts.next().unwrap_or_default();
    if !version.starts_with("HTTP/1.") {
        return Err(StatusLineError::Malformed);
    }

    let code = parts.next().ok_or(StatusLineError::Malformed)?;
    if code.len() != 3 || !code.bytes().all(|b| b.is_ascii_digit()) {
        return Err(StatusLineError::Malformed);
    }
    code.parse().map_err(|_| StatusLineError::Malformed)
}

/// Whether a status code counts as accepted by the collector.
#[inline]
pub const fn is_success(status: u16) -> bool {
    status >= 200 && status < 300
}

//! HTTP transport over `embassy-net`
//!
//! The session is a resolved collector address. Each send opens a fresh TCP
//! connection, writes one `POST`, reads the status line and closes.

use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;

use embassy_net::dns::DnsQueryType;
use embassy_net::tcp::TcpSocket;
use embassy_net::{IpAddress, Ipv4Address, Stack};
use embassy_time::Duration;
use embedded_io_async::Write;
use log::{debug, info};

use atmo_core::error::detail;
use atmo_core::http::{Endpoint, StatusLineError, parse_status, post_request};
use atmo_core::{Ack, Outbound, SessionFailure, Transport, TransportError};

const SOCKET_BUFFER_SIZE: usize = 1024;
const MAX_RESPONSE_HEAD: usize = 512;

pub struct HttpTransport {
    stack: Stack<'static>,
    endpoint: Endpoint<'static>,
    timeout: Duration,
    remote: Option<IpAddress>,
    rx_buffer: Box<[u8]>,
    tx_buffer: Box<[u8]>,
}

impl HttpTransport {
    pub fn new(stack: Stack<'static>, endpoint: Endpoint<'static>, timeout: Duration) -> Self {
        Self {
            stack,
            endpoint,
            timeout,
            remote: None,
            rx_buffer: vec![0; SOCKET_BUFFER_SIZE].into_boxed_slice(),
            tx_buffer: vec![0; SOCKET_BUFFER_SIZE].into_boxed_slice(),
        }
    }

    async fn resolve(&self) -> Result<IpAddress, SessionFailure> {
        if let Ok(ip) = self.endpoint.host.parse::<Ipv4Address>() {
            return Ok(IpAddress::Ipv4(ip));
        }

        let addresses = self
            .stack
            .dns_query(self.endpoint.host, DnsQueryType::A)
            .await
            .map_err(|e| SessionFailure::Handshake(detail(format_args!("DNS: {:?}", e))))?;

        addresses.first().copied().ok_or_else(|| {
            SessionFailure::Handshake(detail(format_args!(
                "{} has no A record",
                self.endpoint.host
            )))
        })
    }
}

impl Transport for HttpTransport {
    async fn connect(&mut self) -> Result<(), SessionFailure> {
        if !self.stack.is_config_up() {
            return Err(SessionFailure::LinkDown);
        }

        let remote = self.resolve().await?;
        info!(
            "Collector {} at {}:{}",
            self.endpoint.host, remote, self.endpoint.port
        );
        self.remote = Some(remote);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.remote.is_some()
    }

    fn disconnect(&mut self) {
        self.remote = None;
    }

    async fn send(&mut self, message: Outbound<'_>) -> Result<Ack, TransportError> {
        let remote = self.remote.ok_or(TransportError::NoSession)?;
        let Outbound::Post { body, api_key } = message else {
            return Err(TransportError::Unsupported);
        };
        let request = post_request(&self.endpoint, api_key, body);

        let mut socket = TcpSocket::new(self.stack, &mut self.rx_buffer, &mut self.tx_buffer);
        socket.set_timeout(Some(self.timeout));

        socket
            .connect((remote, self.endpoint.port))
            .await
            .map_err(|e| TransportError::Io(detail(format_args!("connect: {:?}", e))))?;

        let result = exchange(&mut socket, &request).await;
        socket.close();
        result.map(Ack::Status)
    }
}

fn io_error(e: embassy_net::tcp::Error) -> TransportError {
    TransportError::Io(detail(format_args!("{:?}", e)))
}

/// Write the request and read until the status line is complete.
async fn exchange(socket: &mut TcpSocket<'_>, request: &[u8]) -> Result<u16, TransportError> {
    socket.write_all(request).await.map_err(io_error)?;
    socket.flush().await.map_err(io_error)?;

    let mut response = Vec::with_capacity(64);
    let mut chunk = [0u8; 128];
    loop {
        match parse_status(&response) {
            Ok(status) => return Ok(status),
            Err(StatusLineError::Incomplete) if response.len() < MAX_RESPONSE_HEAD => {}
            Err(_) => {
                debug!("Unparsable response head: {} bytes", response.len());
                return Err(TransportError::MalformedResponse);
            }
        }

        let n = socket.read(&mut chunk).await.map_err(io_error)?;
        if n == 0 {
            return Err(TransportError::MalformedResponse);
        }
        response.extend_from_slice(&chunk[..n]);
    }
}

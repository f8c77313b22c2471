//! Reading publication
//!
//! One reading, one attempt. The publisher never retries and never queues:
//! whatever happens, the reading is dropped once `publish` returns and the
//! next cadence tick produces a fresh one.

use alloc::string::String;

use embassy_time::Duration;
use log::info;

use crate::config::AgentConfig;
use crate::connectivity::{Ack, ConnectivityManager, Link, Outbound, Transport};
use crate::error::PublishError;
use crate::http::is_success;
use crate::reading::Reading;
use crate::record::{self, WireFormat};

pub struct Publisher {
    format: WireFormat,
    api_key: Option<String>,
    topic: String,
    send_timeout: Duration,
}

impl Publisher {
    pub fn new(
        format: WireFormat,
        api_key: Option<&str>,
        topic: &str,
        send_timeout: Duration,
    ) -> Self {
        Self {
            format,
            api_key: api_key.map(String::from),
            topic: String::from(topic),
            send_timeout,
        }
    }

    pub fn from_config(config: &AgentConfig<'_>) -> Self {
        Self::new(
            config.wire_format,
            config.collector.api_key,
            config.bus.topic,
            config.network_timeout(),
        )
    }

    /// Deliver a reading through the connection's active session.
    ///
    /// The link and session are brought up first; if either cannot be, the
    /// attempt is abandoned without sending anything.
    pub async fn publish<L: Link, T: Transport>(
        &self,
        connection: &mut ConnectivityManager<L, T>,
        reading: &Reading,
    ) -> Result<(), PublishError> {
        connection.ensure_up().await.map_err(PublishError::Link)?;
        connection
            .ensure_session()
            .await
            .map_err(PublishError::Session)?;

        let payload = record::encode(reading, self.format).map_err(|_| PublishError::Encode)?;
        let message = match self.format {
            WireFormat::Http => Outbound::Post {
                body: &payload,
                api_key: self.api_key.as_deref(),
            },
            WireFormat::MessageBus => Outbound::Publish {
                topic: &self.topic,
                payload: &payload,
            },
        };

        let ack = connection
            .send(message, self.send_timeout)
            .await
            .map_err(PublishError::Transport)?;

        match ack {
            Ack::Status(status) if is_success(status) => {
                info!("Reading delivered (HTTP {}, {} bytes)", status, payload.len());
                Ok(())
            }
            Ack::Status(status) => Err(PublishError::Rejected(status)),
            Ack::Published => {
                info!("Reading published to {} ({} bytes)", self.topic, payload.len());
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::ConnectivitySettings;
    use crate::error::{LinkFailure, SessionFailure, TransportError};
    use crate::reading::{RawSample, SampleContext};
    use alloc::vec::Vec;
    use embassy_futures::block_on;

    struct AlwaysUp;

    impl Link for AlwaysUp {
        async fn associate(&mut self) -> Result<(), LinkFailure> {
            Ok(())
        }

        fn is_up(&self) -> bool {
            true
        }
    }

    /// Records what it was asked to send and answers with a fixed ack.
    struct Recorder {
        ack: Ack,
        sent: Vec<(Option<String>, Option<String>, Vec<u8>)>,
    }

    impl Recorder {
        fn new(ack: Ack) -> Self {
            Self {
                ack,
                sent: Vec::new(),
            }
        }
    }

    impl Transport for Recorder {
        async fn connect(&mut self) -> Result<(), SessionFailure> {
            Ok(())
        }

        fn is_connected(&self) -> bool {
            true
        }

        fn disconnect(&mut self) {}

        async fn send(&mut self, message: Outbound<'_>) -> Result<Ack, TransportError> {
            let entry = match message {
                Outbound::Post { body, api_key } => (api_key.map(String::from), None, body.to_vec()),
                Outbound::Publish { topic, payload } => {
                    (None, Some(String::from(topic)), payload.to_vec())
                }
            };
            self.sent.push(entry);
            Ok(self.ack)
        }
    }

    fn reading() -> Reading {
        let sample = RawSample {
            raw_adc_count: 700,
            temperature_c: 24.5,
            humidity_pct: 60.0,
        };
        Reading::new("atmo-01", sample, 450.0, SampleContext::default()).unwrap()
    }

    fn connection(ack: Ack) -> ConnectivityManager<AlwaysUp, Recorder> {
        ConnectivityManager::new(AlwaysUp, Recorder::new(ack), ConnectivitySettings::default())
    }

    #[test]
    fn test_http_post_carries_api_key() {
        let publisher = Publisher::new(
            WireFormat::Http,
            Some("sk_live"),
            "unused",
            Duration::from_secs(1),
        );
        let mut connection = connection(Ack::Status(200));

        block_on(publisher.publish(&mut connection, &reading())).unwrap();

        let sent = &connection.transport().sent;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0.as_deref(), Some("sk_live"));
        assert!(sent[0].2.starts_with(br#"{"sensor_id":"atmo-01""#));
    }

    #[test]
    fn test_bus_publish_uses_topic() {
        let publisher = Publisher::new(
            WireFormat::MessageBus,
            None,
            "aqi/sensor/atmo-01",
            Duration::from_secs(1),
        );
        let mut connection = connection(Ack::Published);

        block_on(publisher.publish(&mut connection, &reading())).unwrap();

        let sent = &connection.transport().sent;
        assert_eq!(sent[0].1.as_deref(), Some("aqi/sensor/atmo-01"));
        let text = core::str::from_utf8(&sent[0].2).unwrap();
        assert!(text.contains(r#""aqi_calculated":50"#));
        assert!(text.contains(r#""mq135_raw":700"#));
    }

    #[test]
    fn test_non_2xx_is_rejected() {
        let publisher = Publisher::new(WireFormat::Http, None, "", Duration::from_secs(1));

        for status in [199, 301, 401, 404, 503] {
            let mut connection = connection(Ack::Status(status));
            assert_eq!(
                block_on(publisher.publish(&mut connection, &reading())),
                Err(PublishError::Rejected(status))
            );
        }
    }
}

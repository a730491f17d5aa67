//! MQTT transport over TLS.
//!
//! Uses the synchronous `rumqttc` client. The connection is driven only from
//! [`Transport::poll`], so all network work happens on the control loop's
//! thread inside a bounded window.

use std::time::{Duration, Instant};

use rumqttc::{
    Client, ConnectionError, Event, MqttOptions, Packet, QoS, RecvTimeoutError,
    Transport as Link,
};
use tracing::{debug, info, trace, warn};

use crate::error::TransportError;
use crate::transport::{Credentials, InboundMessage, Transport};

/// Request queue depth between client and connection.
const REQUEST_CAPACITY: usize = 10;

/// Events handled per poll before yielding to the control loop.
const MAX_EVENTS_PER_POLL: usize = 32;

struct Session {
    client: Client,
    connection: rumqttc::Connection,
}

/// MQTT client bound to one broker.
pub struct MqttTransport {
    host: String,
    port: u16,
    keep_alive: Duration,
    connect_timeout: Duration,
    poll_window: Duration,
    buffer_size: usize,
    session: Option<Session>,
}

impl MqttTransport {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            keep_alive: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            poll_window: Duration::from_millis(10),
            buffer_size: platescan_core::constants::DEFAULT_BUFFER_SIZE,
            session: None,
        }
    }

    pub fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// How long to wait for the broker's acknowledgement on connect.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// How long each poll waits for the first event.
    pub fn with_poll_window(mut self, window: Duration) -> Self {
        self.poll_window = window;
        self
    }

    fn options(&self, credentials: &Credentials) -> MqttOptions {
        let mut options =
            MqttOptions::new(credentials.client_id.clone(), self.host.clone(), self.port);
        options.set_keep_alive(self.keep_alive);
        options.set_clean_session(true);
        options.set_credentials(credentials.username.clone(), credentials.password.clone());
        options.set_max_packet_size(self.buffer_size, self.buffer_size);
        options.set_transport(Link::tls_with_default_config());
        options
    }
}

impl Transport for MqttTransport {
    fn set_buffer_size(&mut self, bytes: usize) {
        self.buffer_size = bytes;
    }

    fn connect(&mut self, credentials: &Credentials) -> Result<(), TransportError> {
        self.disconnect();
        info!(host = %self.host, port = self.port, client_id = %credentials.client_id, "Connecting to MQTT broker");

        let (client, mut connection) = Client::new(self.options(credentials), REQUEST_CAPACITY);
        let deadline = Instant::now() + self.connect_timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match connection.recv_timeout(remaining) {
                Ok(Ok(Event::Incoming(Packet::ConnAck(ack)))) => {
                    debug!(code = ?ack.code, "Broker acknowledged connection");
                    break;
                }
                Ok(Ok(event)) => trace!(?event, "MQTT event before ConnAck"),
                Ok(Err(ConnectionError::ConnectionRefused(code))) => {
                    return Err(TransportError::Rejected(format!("{code:?}")));
                }
                Ok(Err(e)) => return Err(TransportError::connect_failed(e.to_string())),
                Err(RecvTimeoutError::Timeout) => {
                    return Err(TransportError::connect_failed("timed out waiting for ConnAck"));
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(TransportError::connect_failed("connection closed"));
                }
            }
        }

        info!("MQTT session established");
        self.session = Some(Session { client, connection });
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    fn disconnect(&mut self) {
        if let Some(session) = self.session.take() {
            if let Err(e) = session.client.try_disconnect() {
                debug!(error = %e, "Disconnect request not queued");
            }
            info!("MQTT session closed");
        }
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        let session = self.session.as_mut().ok_or(TransportError::NotConnected)?;
        session
            .client
            .try_subscribe(topic, QoS::AtMostOnce)
            .map_err(|e| TransportError::subscribe(topic, e.to_string()))?;
        debug!(topic, "Subscription queued");
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), TransportError> {
        let session = self.session.as_mut().ok_or(TransportError::NotConnected)?;
        session
            .client
            .try_publish(topic, QoS::AtMostOnce, false, payload.to_vec())
            .map_err(|e| TransportError::publish(topic, e.to_string()))
    }

    fn poll(&mut self) -> Vec<InboundMessage> {
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };

        let mut inbound = Vec::new();
        for _ in 0..MAX_EVENTS_PER_POLL {
            match session.connection.recv_timeout(self.poll_window) {
                Ok(Ok(Event::Incoming(Packet::Publish(publish)))) => {
                    inbound.push(InboundMessage::new(publish.topic, publish.payload));
                }
                Ok(Ok(event)) => trace!(?event, "MQTT event"),
                Ok(Err(e)) => {
                    warn!(error = %e, "MQTT connection lost");
                    self.session = None;
                    break;
                }
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => {
                    warn!("MQTT event loop closed");
                    self.session = None;
                    break;
                }
            }
        }
        inbound
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_connected_operations() {
        let mut transport = MqttTransport::new("hub.example.net", 8883);
        assert!(!transport.is_connected());
        assert_eq!(
            transport.publish("t", b"x"),
            Err(TransportError::NotConnected)
        );
        assert_eq!(transport.subscribe("t"), Err(TransportError::NotConnected));
        assert!(transport.poll().is_empty());
        transport.disconnect();
    }

    #[test]
    fn test_options_carry_settings() {
        let mut transport = MqttTransport::new("hub.example.net", 8883)
            .with_keep_alive(Duration::from_secs(45));
        transport.set_buffer_size(2048);

        let options = transport.options(&Credentials {
            client_id: "dev1".into(),
            username: "hub.example.net/dev1/?api-version=2020-09-30".into(),
            password: "token".into(),
        });

        assert_eq!(options.client_id(), "dev1");
        assert_eq!(options.broker_address(), ("hub.example.net".to_string(), 8883));
        assert_eq!(options.keep_alive(), Duration::from_secs(45));
        assert_eq!(options.max_packet_size(), 2048);
    }
}

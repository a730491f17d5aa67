//! In-memory transport for tests and offline host runs.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::TransportError;
use crate::transport::{Credentials, InboundMessage, Transport};

#[derive(Debug, Default)]
struct Broker {
    connected: bool,
    failing_connects: usize,
    reject: bool,
    publish_failing: bool,
    buffer_size: usize,
    connect_attempts: usize,
    logins: Vec<Credentials>,
    subscriptions: Vec<String>,
    published: Vec<(String, Vec<u8>)>,
    inbound: VecDeque<InboundMessage>,
}

fn lock(broker: &Mutex<Broker>) -> MutexGuard<'_, Broker> {
    broker.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Transport backed by a simulated broker.
///
/// # Examples
///
/// ```
/// use platescan_cloud::mock::MockTransport;
/// use platescan_cloud::transport::{Credentials, Transport};
///
/// let (mut transport, broker) = MockTransport::new();
/// transport
///     .connect(&Credentials {
///         client_id: "dev1".into(),
///         username: "user".into(),
///         password: "token".into(),
///     })
///     .unwrap();
///
/// transport.publish("devices/dev1/messages/events/", b"hello").unwrap();
/// assert_eq!(broker.published().len(), 1);
/// ```
#[derive(Debug)]
pub struct MockTransport {
    broker: Arc<Mutex<Broker>>,
}

impl MockTransport {
    pub fn new() -> (Self, MockBrokerHandle) {
        let broker = Arc::new(Mutex::new(Broker::default()));
        (
            Self {
                broker: Arc::clone(&broker),
            },
            MockBrokerHandle { broker },
        )
    }
}

impl Transport for MockTransport {
    fn set_buffer_size(&mut self, bytes: usize) {
        lock(&self.broker).buffer_size = bytes;
    }

    fn connect(&mut self, credentials: &Credentials) -> Result<(), TransportError> {
        let mut broker = lock(&self.broker);
        broker.connected = false;
        broker.connect_attempts += 1;

        if broker.failing_connects > 0 {
            broker.failing_connects -= 1;
            return Err(TransportError::connect_failed("network unreachable"));
        }
        if broker.reject {
            return Err(TransportError::Rejected("NotAuthorized".into()));
        }

        broker.logins.push(credentials.clone());
        broker.connected = true;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        lock(&self.broker).connected
    }

    fn disconnect(&mut self) {
        lock(&self.broker).connected = false;
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        let mut broker = lock(&self.broker);
        if !broker.connected {
            return Err(TransportError::NotConnected);
        }
        broker.subscriptions.push(topic.to_string());
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), TransportError> {
        let mut broker = lock(&self.broker);
        if !broker.connected {
            return Err(TransportError::NotConnected);
        }
        if broker.publish_failing {
            return Err(TransportError::publish(topic, "send buffer full"));
        }
        if broker.buffer_size > 0 && payload.len() + topic.len() > broker.buffer_size {
            return Err(TransportError::publish(topic, "packet exceeds buffer"));
        }
        broker.published.push((topic.to_string(), payload.to_vec()));
        Ok(())
    }

    fn poll(&mut self) -> Vec<InboundMessage> {
        let mut broker = lock(&self.broker);
        if !broker.connected {
            return Vec::new();
        }
        broker.inbound.drain(..).collect()
    }
}

/// Control handle for a [`MockTransport`].
#[derive(Debug, Clone)]
pub struct MockBrokerHandle {
    broker: Arc<Mutex<Broker>>,
}

impl MockBrokerHandle {
    /// Make the next `count` connection attempts fail.
    pub fn fail_next_connects(&self, count: usize) {
        lock(&self.broker).failing_connects = count;
    }

    /// Refuse all logins.
    pub fn set_rejecting(&self, reject: bool) {
        lock(&self.broker).reject = reject;
    }

    pub fn set_publish_failing(&self, failing: bool) {
        lock(&self.broker).publish_failing = failing;
    }

    /// Drop the session from the broker side.
    pub fn drop_connection(&self) {
        lock(&self.broker).connected = false;
    }

    /// Queue a message for the device.
    pub fn send_to_device(&self, topic: impl Into<String>, payload: impl Into<Vec<u8>>) {
        lock(&self.broker)
            .inbound
            .push_back(InboundMessage::new(topic, payload.into()));
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.broker).connected
    }

    pub fn connect_attempts(&self) -> usize {
        lock(&self.broker).connect_attempts
    }

    /// Credentials of every successful login, oldest first.
    pub fn logins(&self) -> Vec<Credentials> {
        lock(&self.broker).logins.clone()
    }

    pub fn subscriptions(&self) -> Vec<String> {
        lock(&self.broker).subscriptions.clone()
    }

    /// Every message published by the device, oldest first.
    pub fn published(&self) -> Vec<(String, Vec<u8>)> {
        lock(&self.broker).published.clone()
    }

    pub fn buffer_size(&self) -> usize {
        lock(&self.broker).buffer_size
    }
}

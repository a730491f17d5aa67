//! Messaging transport abstraction.
//!
//! A [`Transport`] is the encrypted publish/subscribe session underneath the
//! [`Channel`](crate::channel::Channel). The channel decides when to connect
//! and with which credentials; the transport only carries bytes.

use bytes::Bytes;

use crate::error::TransportError;

/// Login presented when opening a session.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A message received on a subscribed topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Bytes,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Publish/subscribe session capability.
pub trait Transport {
    /// Maximum packet size used by the next connection.
    fn set_buffer_size(&mut self, bytes: usize);

    /// Open a session, replacing any existing one.
    fn connect(&mut self, credentials: &Credentials) -> Result<(), TransportError>;

    fn is_connected(&self) -> bool;

    /// Close the session. Does nothing if not connected.
    fn disconnect(&mut self);

    fn subscribe(&mut self, topic: &str) -> Result<(), TransportError>;

    /// Queue a message for delivery. There is no delivery confirmation.
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), TransportError>;

    /// Service the session (keep-alive, socket reads) and return messages
    /// received since the last call.
    ///
    /// A session that fails here is dropped, and `is_connected` turns false.
    fn poll(&mut self) -> Vec<InboundMessage>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn set_buffer_size(&mut self, bytes: usize) {
        (**self).set_buffer_size(bytes)
    }

    fn connect(&mut self, credentials: &Credentials) -> Result<(), TransportError> {
        (**self).connect(credentials)
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn disconnect(&mut self) {
        (**self).disconnect()
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        (**self).subscribe(topic)
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), TransportError> {
        (**self).publish(topic, payload)
    }

    fn poll(&mut self) -> Vec<InboundMessage> {
        (**self).poll()
    }
}

//! Messaging channel to the IoT hub.
//!
//! Owns the transport and the token manager, and keeps the session alive
//! from the control loop:
//!
//! 1. [`ensure_connected`](Channel::ensure_connected) blocks, retrying at a
//!    fixed delay, until the transport has a session.
//! 2. [`ensure_token_fresh`](Channel::ensure_token_fresh) re-authenticates
//!    once the token has expired.
//! 3. [`pump`](Channel::pump) services the transport and hands back any
//!    cloud-to-device messages.
//!
//! [`service`](Channel::service) runs all three and is called once per loop
//! iteration.

use embedded_hal::delay::DelayNs;
use platescan_core::Config;
use platescan_core::constants::COMMAND_TOPIC;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::error::Result;
use crate::telemetry::TelemetryRecord;
use crate::token::TokenManager;
use crate::transport::{Credentials, InboundMessage, Transport};

/// Static channel parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSettings {
    pub host: String,
    pub device_id: String,
    pub token_ttl_minutes: u32,
    pub reconnect_delay_ms: u32,
    pub buffer_size: usize,
    pub api_version: String,
}

impl ChannelSettings {
    pub fn from_config(config: &Config) -> Self {
        let delay_ms = config.hub.reconnect_delay_secs.saturating_mul(1000);
        Self {
            host: config.hub.host.clone(),
            device_id: config.device.device_id.clone(),
            token_ttl_minutes: config.hub.token_ttl_minutes,
            reconnect_delay_ms: u32::try_from(delay_ms).unwrap_or(u32::MAX),
            buffer_size: config.hub.buffer_size,
            api_version: config.hub.api_version.clone(),
        }
    }
}

/// Outbound telemetry path as seen by the session controller.
pub trait TelemetryLink {
    /// Keep the link alive and collect inbound messages.
    fn service(&mut self) -> Vec<InboundMessage>;

    /// Send one session result. Failures are reported, never retried.
    fn send(&mut self, record: &TelemetryRecord) -> Result<()>;
}

impl<L: TelemetryLink + ?Sized> TelemetryLink for &mut L {
    fn service(&mut self) -> Vec<InboundMessage> {
        (**self).service()
    }

    fn send(&mut self, record: &TelemetryRecord) -> Result<()> {
        (**self).send(record)
    }
}

/// Authenticated publish/subscribe channel.
pub struct Channel<T, C, D> {
    transport: T,
    tokens: TokenManager<C>,
    delay: D,
    settings: ChannelSettings,
    announced: bool,
}

impl<T: Transport, C: Clock, D: DelayNs> Channel<T, C, D> {
    pub fn new(transport: T, tokens: TokenManager<C>, delay: D, settings: ChannelSettings) -> Self {
        Self {
            transport,
            tokens,
            delay,
            settings,
            announced: false,
        }
    }

    /// MQTT username expected by the hub.
    pub fn username(&self) -> String {
        format!(
            "{}/{}/?api-version={}",
            self.settings.host, self.settings.device_id, self.settings.api_version
        )
    }

    /// Device-to-cloud topic.
    pub fn telemetry_topic(&self) -> String {
        format!("devices/{}/messages/events/", self.settings.device_id)
    }

    /// One connection attempt with a freshly generated token.
    ///
    /// Returns `false` without touching the transport if the token cannot
    /// be generated.
    pub fn connect(&mut self) -> bool {
        self.transport.set_buffer_size(self.settings.buffer_size);

        let password = match self.tokens.generate(self.settings.token_ttl_minutes) {
            Ok(token) => token.as_str().to_string(),
            Err(e) => {
                warn!(error = %e, "Token generation failed");
                return false;
            }
        };

        let credentials = Credentials {
            client_id: self.settings.device_id.clone(),
            username: self.username(),
            password,
        };

        match self.transport.connect(&credentials) {
            Ok(()) => {
                info!(device_id = %self.settings.device_id, "Connected to hub");
                true
            }
            Err(e) => {
                warn!(error = %e, "Hub connection failed");
                false
            }
        }
    }

    /// Block until connected.
    ///
    /// Retries indefinitely with the configured delay between attempts.
    /// Subscribes to the command topic after connecting, and announces the
    /// device after the first connection.
    pub fn ensure_connected(&mut self) {
        if self.transport.is_connected() {
            return;
        }

        let mut attempts = 0u32;
        loop {
            attempts += 1;
            if self.connect() {
                break;
            }
            debug!(attempts, delay_ms = self.settings.reconnect_delay_ms, "Retrying hub connection");
            self.delay.delay_ms(self.settings.reconnect_delay_ms);
        }

        self.on_connected();
    }

    /// Reconnect with a new token if the current one has expired.
    ///
    /// Makes a single attempt; if it fails the next
    /// [`ensure_connected`](Self::ensure_connected) takes over.
    pub fn ensure_token_fresh(&mut self) {
        if !self.tokens.is_expired() {
            return;
        }

        info!("SAS token expired, re-authenticating");
        self.transport.disconnect();
        if self.connect() {
            self.on_connected();
        }
    }

    /// Fire-and-forget publish.
    pub fn publish(&mut self, topic: &str, payload: &[u8]) -> bool {
        match self.transport.publish(topic, payload) {
            Ok(()) => {
                debug!(topic, bytes = payload.len(), "Published");
                true
            }
            Err(e) => {
                warn!(error = %e, "Publish dropped");
                false
            }
        }
    }

    /// Serialize and publish a session result on the telemetry topic.
    ///
    /// # Errors
    ///
    /// Returns `ChannelError::Payload` if serialization fails and
    /// `ChannelError::Transport` if the transport refuses the message.
    pub fn publish_telemetry(&mut self, record: &TelemetryRecord) -> Result<()> {
        let payload = record.to_json()?;
        let topic = self.telemetry_topic();
        self.transport.publish(&topic, payload.as_bytes())?;
        info!(user_id = record.user_id, rating = record.rating, "Telemetry sent");
        Ok(())
    }

    /// Publish the device identity on the telemetry topic.
    pub fn announce(&mut self) -> bool {
        let topic = self.telemetry_topic();
        let id = self.settings.device_id.clone();
        self.publish(&topic, id.as_bytes())
    }

    /// Service the transport and return inbound messages.
    pub fn pump(&mut self) -> Vec<InboundMessage> {
        let messages = self.transport.poll();
        for message in &messages {
            info!(topic = %message.topic, bytes = message.payload.len(), "Command received");
        }
        messages
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    pub fn tokens(&self) -> &TokenManager<C> {
        &self.tokens
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn on_connected(&mut self) {
        if let Err(e) = self.transport.subscribe(COMMAND_TOPIC) {
            warn!(error = %e, "Command topic subscription failed");
        }

        if !self.announced {
            self.announced = self.announce();
        }
    }
}

impl<T: Transport, C: Clock, D: DelayNs> TelemetryLink for Channel<T, C, D> {
    fn service(&mut self) -> Vec<InboundMessage> {
        self.ensure_connected();
        self.ensure_token_fresh();
        self.pump()
    }

    fn send(&mut self, record: &TelemetryRecord) -> Result<()> {
        self.publish_telemetry(record)
    }
}

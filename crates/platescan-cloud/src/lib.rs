//! Cloud connectivity for the PlateScan station.
//!
//! Session results leave the device as JSON telemetry over an authenticated
//! MQTT channel to an Azure IoT hub:
//!
//! - [`token`] signs short-lived SAS tokens from the device key,
//! - [`channel`] keeps the session alive, re-authenticating on expiry,
//! - [`mqtt`] is the TLS transport, [`mock`] an in-memory stand-in,
//! - [`telemetry`] defines the payloads in both directions.
//!
//! # Example
//!
//! ```
//! use chrono::{TimeZone, Utc};
//! use embedded_hal_mock::eh1::delay::NoopDelay;
//! use platescan_cloud::channel::{Channel, ChannelSettings, TelemetryLink};
//! use platescan_cloud::clock::ManualClock;
//! use platescan_cloud::mock::MockTransport;
//! use platescan_cloud::token::TokenManager;
//!
//! let clock = ManualClock::at(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
//! let tokens = TokenManager::new(clock, "hub.example.net", "dev1", "c2VjcmV0").unwrap();
//! let (transport, broker) = MockTransport::new();
//!
//! let settings = ChannelSettings {
//!     host: "hub.example.net".into(),
//!     device_id: "dev1".into(),
//!     token_ttl_minutes: 60,
//!     reconnect_delay_ms: 5000,
//!     buffer_size: 1024,
//!     api_version: "2020-09-30".into(),
//! };
//! let mut channel = Channel::new(transport, tokens, NoopDelay::new(), settings);
//!
//! channel.service();
//! assert!(broker.is_connected());
//! ```

pub mod channel;
pub mod clock;
pub mod error;
#[cfg(feature = "mock")]
pub mod mock;
pub mod mqtt;
pub mod telemetry;
pub mod token;
pub mod transport;

pub use channel::{Channel, ChannelSettings, TelemetryLink};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ChannelError, Result, TokenError, TransportError};
pub use telemetry::{EnrollmentRequest, TelemetryRecord};
pub use token::{SasToken, TokenManager};
pub use transport::{Credentials, InboundMessage, Transport};

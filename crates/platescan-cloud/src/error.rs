//! Error types for the cloud channel.

/// Failure to produce a SAS token.
///
/// A failed generation never leaves a token installed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    /// Wall-clock time is not available yet.
    #[error("Wall clock not synchronized")]
    ClockUnavailable,

    /// Computing the signature failed or produced nothing.
    #[error("Token signing failed: {0}")]
    Signing(String),

    /// The expiry embedded in the token could not be read back.
    #[error("Token expiry could not be decoded")]
    ExpiryDecode,

    /// The device key is not valid base64 or is empty.
    #[error("Invalid device key")]
    InvalidKey,
}

/// Failure reported by a messaging transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Transport not connected")]
    NotConnected,

    /// Network level failure while establishing the session.
    #[error("Connect failed: {0}")]
    ConnectFailed(String),

    /// The broker refused the credentials.
    #[error("Connection rejected by broker: {0}")]
    Rejected(String),

    #[error("Publish to {topic} failed: {reason}")]
    Publish { topic: String, reason: String },

    #[error("Subscribe to {topic} failed: {reason}")]
    Subscribe { topic: String, reason: String },
}

impl TransportError {
    /// Create a new connect failure.
    pub fn connect_failed(reason: impl Into<String>) -> Self {
        Self::ConnectFailed(reason.into())
    }

    /// Create a new publish failure.
    pub fn publish(topic: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Publish {
            topic: topic.into(),
            reason: reason.into(),
        }
    }

    /// Create a new subscribe failure.
    pub fn subscribe(topic: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Subscribe {
            topic: topic.into(),
            reason: reason.into(),
        }
    }
}

/// Errors surfaced by the messaging channel.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Telemetry could not be serialized.
    #[error("Payload encoding failed: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Result type alias for channel operations.
pub type Result<T> = std::result::Result<T, ChannelError>;

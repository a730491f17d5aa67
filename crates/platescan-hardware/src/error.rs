//! Error types for hardware operations.
//!
//! [`HardwareError`] covers low-level device failures (bus transfers, reader
//! commands). [`CardError`] is the card session taxonomy surfaced to the
//! session controller and rendered on the display.

/// Result type alias for hardware operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

/// Errors that can occur during hardware device operations.
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// Device is not connected or has been disconnected.
    #[error("Device disconnected: {device}")]
    Disconnected { device: String },

    /// Device communication error.
    #[error("Communication error: {message}")]
    CommunicationError { message: String },

    /// Device initialization failed.
    #[error("Initialization failed: {message}")]
    InitializationFailed { message: String },

    /// Card rejected the key for a block.
    #[error("Authentication failed for block {block}")]
    AuthenticationFailed { block: u8 },

    /// No card in the reader field.
    #[error("No card in field")]
    NoCard,

    /// Card reading error.
    #[error("Card read error: {message}")]
    CardReadError { message: String },

    /// Card writing error.
    #[error("Card write error: {message}")]
    CardWriteError { message: String },
}

impl HardwareError {
    /// Create a new disconnected error.
    pub fn disconnected(device: impl Into<String>) -> Self {
        Self::Disconnected {
            device: device.into(),
        }
    }

    /// Create a new communication error.
    pub fn communication(message: impl Into<String>) -> Self {
        Self::CommunicationError {
            message: message.into(),
        }
    }

    /// Create a new initialization failed error.
    pub fn initialization_failed(message: impl Into<String>) -> Self {
        Self::InitializationFailed {
            message: message.into(),
        }
    }

    /// Create a new authentication error.
    pub fn authentication(block: u8) -> Self {
        Self::AuthenticationFailed { block }
    }

    /// Create a new card read error.
    pub fn card_read(message: impl Into<String>) -> Self {
        Self::CardReadError {
            message: message.into(),
        }
    }

    /// Create a new card write error.
    pub fn card_write(message: impl Into<String>) -> Self {
        Self::CardWriteError {
            message: message.into(),
        }
    }

    /// Map an `embedded-hal` bus error into a communication error.
    pub fn from_bus<E: embedded_hal::i2c::Error>(error: E) -> Self {
        Self::communication(format!("bus error: {:?}", error.kind()))
    }
}

/// Failure of a card record operation.
///
/// No variant carries partial data: a failed read never yields a record and
/// a failed write never leaves a half-written block behind.
#[derive(Debug, thiserror::Error)]
pub enum CardError {
    /// The card refused the key.
    #[error("Card authentication failed for block {block}")]
    Authentication { block: u8 },

    /// The reader or the card stopped responding mid-operation.
    #[error("Card transport error: {0}")]
    Transport(#[source] HardwareError),

    /// The block does not start with the station marker.
    #[error("Unrecognized card")]
    Unrecognized,

    /// The marker matched but the record contents are impossible.
    #[error("Invalid card record: {0}")]
    InvalidRecord(String),
}

impl CardError {
    /// Short text shown on the status display.
    pub fn display_text(&self) -> &'static str {
        match self {
            Self::Authentication { .. } => "AUTH FAILED",
            Self::Transport(_) => "READ ERROR",
            Self::Unrecognized => "UNKNOWN CARD",
            Self::InvalidRecord(_) => "BAD CARD DATA",
        }
    }
}

impl From<HardwareError> for CardError {
    fn from(error: HardwareError) -> Self {
        match error {
            HardwareError::AuthenticationFailed { block } => Self::Authentication { block },
            other => Self::Transport(other),
        }
    }
}

impl From<platescan_core::Error> for CardError {
    fn from(error: platescan_core::Error) -> Self {
        match error {
            platescan_core::Error::UnrecognizedCard { .. } => Self::Unrecognized,
            other => Self::InvalidRecord(other.to_string()),
        }
    }
}

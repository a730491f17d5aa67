use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Record errors
    #[error("Unrecognized card: marker {found:02X?} does not match")]
    UnrecognizedCard { found: [u8; 2] },

    #[error("Invalid menu record: {0}")]
    InvalidRecord(String),

    #[error("Menu is full: at most {max} items")]
    CapacityExceeded { max: usize },

    #[error("Invalid user id: {0}")]
    InvalidUserId(u8),

    // Session errors
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing configuration key: {0}")]
    MissingConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;

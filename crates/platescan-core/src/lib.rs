//! Shared types, constants and configuration for the plate scanning station.

pub mod config;
pub mod constants;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

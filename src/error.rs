//! Custom error types for the RGA driver.
//!
//! This module defines the primary error type, `RgaError`, for the entire
//! crate. Using the `thiserror` crate, it provides a centralized and
//! consistent way to classify the failure modes of a device exchange:
//!
//! - **`Config` / `Configuration`**: file-level and semantic configuration
//!   errors. `Config` wraps the `config` crate's own error; `Configuration`
//!   covers values that parse but are logically invalid (e.g. a zero
//!   exchange timeout).
//! - **`Io` / `ExchangeTimeout` / `NotConnected`**: transport failures. The
//!   affected cache entries keep their last known value and the poll loop
//!   retries on its normal cadence.
//! - **`Frame` / `HttpStatus`**: protocol framing failures: the status line
//!   or brace-delimited payload could not be located, or the instrument
//!   answered with a non-200 code.
//! - **`Decode`**: a JSON document did not match the endpoint's expected
//!   shape. Only the targeted endpoint struct stays stale; the rest of the
//!   poll cycle proceeds.
//! - **`Validation`**: derived-value preconditions failed (mass-axis
//!   computation).
//! - **`State`**: a start/stop command was rejected by the acquisition state
//!   machine before any device exchange was attempted.
//!
//! By using `#[from]`, `RgaError` can be seamlessly created from underlying
//! error types, simplifying error handling throughout the crate with the
//! `?` operator.

use std::time::Duration;

use thiserror::Error;

/// Convenience alias for results using the driver error type.
pub type RgaResult<T> = std::result::Result<T, RgaError>;

/// All failure modes of the driver.
#[derive(Error, Debug)]
pub enum RgaError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Configuration validation error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not connected to instrument")]
    NotConnected,

    #[error("Exchange timed out with no data after {0:?}")]
    ExchangeTimeout(Duration),

    #[error("Protocol framing error: {0}")]
    Frame(String),

    #[error("Instrument returned status {0}")]
    HttpStatus(u16),

    #[error("Decode error in '{endpoint}': {reason}")]
    Decode {
        endpoint: &'static str,
        reason: String,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Command rejected: {0}")]
    State(String),

    #[error("Invalid channel {0}")]
    InvalidChannel(usize),

    #[error("Invalid filament index {0}")]
    InvalidFilament(usize),

    #[error("Command {0} is read-only")]
    ReadOnly(String),

    #[error("Command {0} is write-only")]
    WriteOnly(String),

    #[error("Invalid value for {command}: {reason}")]
    InvalidValue { command: String, reason: String },

    #[error("Poll task already running")]
    AlreadyRunning,
}

impl RgaError {
    /// Shorthand for a per-endpoint decode failure.
    pub(crate) fn decode(endpoint: &'static str, reason: impl Into<String>) -> Self {
        RgaError::Decode {
            endpoint,
            reason: reason.into(),
        }
    }
}

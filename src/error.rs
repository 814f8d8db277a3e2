//! Error handling types for callwire
//!
//! This module provides the error types surfaced by exchanges and by
//! configuration loading.

use std::path::PathBuf;
use std::sync::LockResult;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

/// Outcome error of a single exchange.
///
/// Every `send` produces exactly one of a decoded payload or one of these.
/// The core never retries on any of them.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExchangeError {
    /// The channel is not connected, or dropped while the exchange was pending
    #[error("connectivity error: {reason}")]
    Connectivity { reason: String },

    /// No response arrived before the deadline
    #[error("exchange {exchange} timed out after {after:?}")]
    Timeout { exchange: String, after: Duration },

    /// The remote endpoint delivered the designated error event
    #[error("remote error: {message}")]
    Remote {
        message: String,
        detail: Option<Value>,
    },

    /// An inbound payload did not have the shape expected for the operation
    #[error("protocol error on {event}: {message}")]
    Protocol { event: String, message: String },

    /// Single-flight mode rejected an overlapping call
    #[error("an exchange for {event} is already in flight")]
    Overlapping { event: String },
}

/// Result type for exchanges
pub type ExchangeResult<T> = Result<T, ExchangeError>;

impl ExchangeError {
    pub fn connectivity(reason: impl Into<String>) -> Self {
        ExchangeError::Connectivity {
            reason: reason.into(),
        }
    }

    pub fn remote(message: impl Into<String>) -> Self {
        ExchangeError::Remote {
            message: message.into(),
            detail: None,
        }
    }

    pub fn protocol(event: impl Into<String>, message: impl Into<String>) -> Self {
        ExchangeError::Protocol {
            event: event.into(),
            message: message.into(),
        }
    }

    pub fn is_connectivity(&self) -> bool {
        matches!(self, ExchangeError::Connectivity { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ExchangeError::Timeout { .. })
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file exists but could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file is not valid TOML for the settings schema
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Endpoint cannot be turned into a socket address
    #[error("invalid endpoint {endpoint:?}: {message}")]
    InvalidEndpoint { endpoint: String, message: String },
}

/// Recover the guard from a poisoned lock, logging which operation hit it.
pub(crate) trait LockResultExt<T> {
    fn recover_poison(self, context: &str) -> T;
}

impl<T> LockResultExt<T> for LockResult<T> {
    fn recover_poison(self, context: &str) -> T {
        match self {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!(
                    target: "callwire::lock_recovery",
                    "Recovered from poisoned lock in {}",
                    context
                );
                poisoned.into_inner()
            }
        }
    }
}

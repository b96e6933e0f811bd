#![warn(mismatched_lifetime_syntaxes)]
#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Error types for the CMH deadlock simulator
//!
//! This crate provides fine-grained error types organized by domain.
//! All error types implement Clone for easier handling across tasks.

use std::borrow::Cow;

use thiserror::Error;

pub mod config;
pub mod pool;
pub mod probe;
pub mod simulation;

// Re-export all error types at the root
pub use config::ConfigError;
pub use pool::PoolError;
pub use probe::ProbeError;
pub use simulation::SimulationError;

/// Generic error type for cross-crate boundaries
#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Error {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("resource pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("probe error: {0}")]
    Probe(#[from] ProbeError),

    #[error("simulation error: {0}")]
    Simulation(#[from] SimulationError),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("I/O error: {message}")]
    Io { message: String },
}

impl Error {
    /// Create an internal error with a message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
        }
    }
}

/// Result type alias for simulator operations
pub type Result<T> = std::result::Result<T, Error>;

/// Minimal interface for rendering user-facing error information without
/// requiring heavyweight envelopes.
pub trait UserFacingError {
    /// Short message suitable for CLI output.
    fn user_message(&self) -> Cow<'_, str>;

    /// Optional remediation hint.
    fn user_hint(&self) -> Option<&'static str> {
        None
    }

    /// Whether retrying the same operation is likely to succeed.
    fn is_retryable(&self) -> bool {
        false
    }

    /// Stable error code for analytics / structured reporting.
    fn user_code(&self) -> Option<&'static str> {
        None
    }
}

impl UserFacingError for Error {
    fn user_message(&self) -> Cow<'_, str> {
        match self {
            Error::Config(err) => err.user_message(),
            Error::Pool(err) => err.user_message(),
            Error::Io { message } => Cow::Owned(message.clone()),
            _ => Cow::Owned(self.to_string()),
        }
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Error::Config(err) => err.user_hint(),
            Error::Pool(err) => err.user_hint(),
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(self, Error::Io { .. })
    }

    fn user_code(&self) -> Option<&'static str> {
        match self {
            Error::Config(err) => err.user_code(),
            Error::Pool(err) => err.user_code(),
            Error::Probe(_) => Some("error.probe"),
            Error::Simulation(_) => Some("error.simulation"),
            Error::Internal(_) => Some("error.internal"),
            Error::Io { .. } => Some("error.io"),
        }
    }
}

/// True when the error is one the operator has to see: an invalid
/// configuration or a release by a non-holder. Everything else is a control
/// signal absorbed by the simulation.
#[must_use]
pub fn is_operator_visible(err: &Error) -> bool {
    matches!(
        err,
        Error::Config(ConfigError::InvalidConfiguration { .. })
            | Error::Pool(PoolError::NotHolder { .. })
    )
}

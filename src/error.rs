//! Error types
//!
//! Routing itself never fails: unmatched events are dropped and handler
//! faults are isolated per dispatch. Errors surface only at the edges, when
//! decoding wire pairs and when joining stage tasks on shutdown.

use crate::event::Channel;

/// Result alias for crate operations
pub type Result<T> = std::result::Result<T, Error>;

/// Failure to turn a serialized pair into a channel event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Not a JSON two-element `[name, payload]` array
    Malformed(String),
    /// Name lacks the `"[channel] key"` form
    MissingChannel(String),
    /// Channel tag is not one the pipeline routes
    UnknownChannel(String),
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::Malformed(reason) => write!(f, "Malformed wire event: {}", reason),
            DecodeError::MissingChannel(name) => {
                write!(f, "Event name has no channel prefix: {}", name)
            }
            DecodeError::UnknownChannel(channel) => write!(f, "Unknown channel: {}", channel),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Error returned by a handler invocation
///
/// Only ever observed by the dispatching group, which logs it and drops
/// that single dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    /// Create a handler error with a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for HandlerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for HandlerError {}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        HandlerError::new(format!("invalid payload: {}", err))
    }
}

impl From<DecodeError> for HandlerError {
    fn from(err: DecodeError) -> Self {
        HandlerError::new(err.to_string())
    }
}

/// Crate-level error
#[derive(Debug)]
pub enum Error {
    /// Wire decoding failed
    Decode(DecodeError),
    /// A stage's router task panicked or was aborted
    StageTask {
        /// Channel the stage serves
        channel: Channel,
        /// Join failure description
        reason: String,
    },
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Decode(err) => write!(f, "{}", err),
            Error::StageTask { channel, reason } => {
                write!(f, "Stage [{}] task failed: {}", channel, reason)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Decode(err) => Some(err),
            Error::StageTask { .. } => None,
        }
    }
}

impl From<DecodeError> for Error {
    fn from(err: DecodeError) -> Self {
        Error::Decode(err)
    }
}

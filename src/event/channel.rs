//! Channel and key types for event routing
//!
//! This module defines the key types that select a handler and the events
//! that flow between stages.

use std::str::FromStr;
use std::sync::Arc;

use serde_json::Value;

use crate::error::DecodeError;

/// Named category of events; one stage routes each channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Incoming transport events and outgoing client actions
    Socket,
    /// Effects derived from socket events
    Effect,
    /// Effects that touch the document
    DomEffect,
    /// Log records
    Log,
}

impl Channel {
    /// All channels in pipeline order
    pub const ALL: [Channel; 4] = [
        Channel::Socket,
        Channel::Effect,
        Channel::DomEffect,
        Channel::Log,
    ];

    /// Wire name of the channel
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Socket => "socket",
            Channel::Effect => "effect",
            Channel::DomEffect => "dom-effect",
            Channel::Log => "log",
        }
    }

    /// Bracketed prefix, e.g. `[dom-effect]`
    pub fn prefix(&self) -> String {
        format!("[{}]", self.as_str())
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "socket" => Ok(Channel::Socket),
            "effect" => Ok(Channel::Effect),
            "dom-effect" => Ok(Channel::DomEffect),
            "log" => Ok(Channel::Log),
            other => Err(DecodeError::UnknownChannel(other.to_string())),
        }
    }
}

/// Channel plus key; the exact-match unit for grouping and handler lookup
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FullKey {
    /// Channel the key belongs to
    pub channel: Channel,
    /// Key within the channel (e.g., "browser:reload")
    pub key: String,
}

impl FullKey {
    /// Create a new full key
    pub fn new(channel: Channel, key: impl Into<String>) -> Self {
        Self {
            channel,
            key: key.into(),
        }
    }

    /// Parse the `"[channel] key"` form
    pub fn parse(name: &str) -> Result<Self, DecodeError> {
        let rest = name
            .strip_prefix('[')
            .ok_or_else(|| DecodeError::MissingChannel(name.to_string()))?;
        let (channel, key) = rest
            .split_once("] ")
            .ok_or_else(|| DecodeError::MissingChannel(name.to_string()))?;

        Ok(Self::new(channel.parse()?, key))
    }
}

impl std::fmt::Display for FullKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.channel, self.key)
    }
}

/// An event flowing through the pipeline
///
/// Cheap to clone: the payload is reference counted.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelEvent {
    /// Full key selecting the handler
    pub key: FullKey,
    /// Event payload
    pub payload: Arc<Value>,
}

impl ChannelEvent {
    /// Create an event on any channel
    pub fn new(channel: Channel, key: impl Into<String>, payload: Value) -> Self {
        Self {
            key: FullKey::new(channel, key),
            payload: Arc::new(payload),
        }
    }

    /// Create a `[socket]` event
    pub fn socket(key: impl Into<String>, payload: Value) -> Self {
        Self::new(Channel::Socket, key, payload)
    }

    /// Create an `[effect]` event
    pub fn effect(key: impl Into<String>, payload: Value) -> Self {
        Self::new(Channel::Effect, key, payload)
    }

    /// Create a `[dom-effect]` event
    pub fn dom(key: impl Into<String>, payload: Value) -> Self {
        Self::new(Channel::DomEffect, key, payload)
    }

    /// Create a `[log]` event
    pub fn log(key: impl Into<String>, payload: Value) -> Self {
        Self::new(Channel::Log, key, payload)
    }

    /// Channel of this event
    pub fn channel(&self) -> Channel {
        self.key.channel
    }
}

/// Transport-level `(name, payload)` pair, without a channel tag
///
/// Both incoming socket messages and outgoing client actions use this shape.
/// They enter the socket stage as `[socket] name`.
#[derive(Debug, Clone, PartialEq)]
pub struct SocketEvent {
    /// Event name as the transport knows it
    pub name: String,
    /// Event payload
    pub payload: Value,
}

impl SocketEvent {
    /// Create a socket event
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }

    /// Lift into the socket channel
    pub fn into_channel_event(self) -> ChannelEvent {
        ChannelEvent::socket(self.name, self.payload)
    }
}

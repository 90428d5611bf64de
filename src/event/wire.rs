//! Wire encoding for channel events
//!
//! A serialized event is a two-element JSON array whose first element embeds
//! the channel and key as `"[channel] key"`. Anything else is rejected here,
//! before it can reach a router.

use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::channel::{Channel, ChannelEvent, FullKey, SocketEvent};
use crate::error::DecodeError;

/// Serialized `(name, payload)` pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireEvent(pub String, pub Value);

impl WireEvent {
    /// Name element of the pair
    pub fn name(&self) -> &str {
        &self.0
    }

    /// Payload element of the pair
    pub fn payload(&self) -> &Value {
        &self.1
    }

    /// Encode as JSON bytes
    pub fn to_bytes(&self) -> Bytes {
        // A String/Value pair has no failing serialization path
        serde_json::to_vec(self)
            .map(Bytes::from)
            .unwrap_or_default()
    }

    /// Decode from JSON bytes
    pub fn from_slice(data: &[u8]) -> Result<Self, DecodeError> {
        serde_json::from_slice(data).map_err(|e| DecodeError::Malformed(e.to_string()))
    }
}

impl From<SocketEvent> for WireEvent {
    fn from(event: SocketEvent) -> Self {
        WireEvent(event.name, event.payload)
    }
}

impl From<WireEvent> for SocketEvent {
    fn from(wire: WireEvent) -> Self {
        SocketEvent::new(wire.0, wire.1)
    }
}

impl From<&ChannelEvent> for WireEvent {
    fn from(event: &ChannelEvent) -> Self {
        WireEvent(event.key.to_string(), Value::clone(&event.payload))
    }
}

impl TryFrom<WireEvent> for ChannelEvent {
    type Error = DecodeError;

    fn try_from(wire: WireEvent) -> Result<Self, Self::Error> {
        decode(wire)
    }
}

/// Encode a channel, key and payload into a wire pair
pub fn encode(channel: Channel, key: &str, payload: Value) -> WireEvent {
    WireEvent(FullKey::new(channel, key).to_string(), payload)
}

/// Decode a wire pair into a routable event
pub fn decode(wire: WireEvent) -> Result<ChannelEvent, DecodeError> {
    let WireEvent(name, payload) = wire;
    Ok(ChannelEvent {
        key: FullKey::parse(&name)?,
        payload: Arc::new(payload),
    })
}

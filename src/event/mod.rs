//! Channel events
//!
//! Every stage of the pipeline consumes and produces [`ChannelEvent`]s: a
//! [`FullKey`] (channel plus key) and a payload. On the wire an event is the
//! pair `["[channel] key", payload]`, see [`WireEvent`].
//!
//! # Zero-Copy Design
//!
//! Payloads sit behind an `Arc`, so broadcasting one event to several
//! downstream stages shares a single allocation.

pub mod channel;
pub mod wire;

pub use channel::{Channel, ChannelEvent, FullKey, SocketEvent};
pub use wire::{decode, encode, WireEvent};

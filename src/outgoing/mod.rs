//! Outgoing client actions
//!
//! Client-originated events enter the socket stage next to incoming socket
//! events. Clicks are the main source: a local click is forwarded to the
//! server unless it is the echo of a click another browser just sent us.

pub mod clicks;
pub mod gate;

pub use clicks::{click_stream, ElementData, INCOMING_CLICK, OUTGOING_CLICK};
pub use gate::{SyncGate, DEFAULT_SYNC_WINDOW};

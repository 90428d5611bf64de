//! Handler registries
//!
//! Each stage dispatches through a time-varying registry: a stream of full
//! snapshots mapping [`FullKey`](crate::event::FullKey) to a [`Handler`].
//! Several independent sources can feed one stage through [`combine`].
//!
//! # Architecture
//!
//! ```text
//!   outputHandlers ──┐
//!                    ├── combine() ──► RegistryStream ──► Stage (effect)
//!   scrollRestore  ──┘   (zip + merge,        │
//!                         later wins)         └─ router keeps latest snapshot
//! ```

pub mod combine;
pub mod handler;
pub mod source;
pub mod store;

pub use combine::combine;
pub use handler::{EventStream, Handler, HandlerResult};
pub use source::{constant, RegistryFeed, RegistryStream};
pub use store::Registry;

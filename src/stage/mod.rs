//! Pipeline stages
//!
//! A stage is one running instance of the router: it binds a channel to a
//! time-varying handler registry and turns an input event stream into a
//! shared output event stream.

pub mod config;
mod group;
pub mod router;

pub use config::StageConfig;
pub use router::{subscriber_stream, Stage, StageHandle};

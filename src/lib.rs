//! Event routing core for browser dev-sync clients
//!
//! Events from the socket transport, from client interactions, and from
//! handlers themselves flow through four chained stages. Each stage looks up
//! a handler by the event's channel and key and forwards whatever the
//! handler returns:
//!
//! ```text
//!   socket + outgoing ──► [socket] ──► [effect] ──► [dom-effect]
//!                             │            │             │
//!                             └────────────┴─────────────┴──► [log]
//! ```
//!
//! # Example
//! ```no_run
//! use serde_json::json;
//! use syncroute::event::{ChannelEvent, SocketEvent};
//! use syncroute::pipeline::{Inputs, OptionStore, Pipeline, PipelineConfig, PipelineSources, SocketHandle};
//! use syncroute::registry::{constant, handler, Registry};
//! use syncroute::Channel;
//!
//! # async fn example() -> syncroute::Result<()> {
//! let (socket, _outbound) = SocketHandle::new(64);
//! let inputs = Inputs::new(socket.clone(), OptionStore::default());
//!
//! let socket_handlers = Registry::new(Channel::Socket).on("browser:reload", |payload, _| {
//!     handler::once(ChannelEvent::effect("reload", payload.clone()))
//! });
//! let sources = PipelineSources::new().socket_handlers(constant(socket_handlers));
//!
//! let pipeline = Pipeline::new(inputs, sources, PipelineConfig::default());
//! let mut effects = pipeline.subscribe(Channel::Effect);
//! let running = pipeline.start();
//!
//! socket.deliver(SocketEvent::new("browser:reload", json!({})));
//! let effect = effects.recv().await.ok();
//! # let _ = effect;
//!
//! running.stop().await
//! # }
//! ```

pub mod error;
pub mod event;
pub mod outgoing;
pub mod pipeline;
pub mod registry;
pub mod stage;
pub mod stats;

pub use error::{DecodeError, Error, HandlerError, Result};
pub use event::{Channel, ChannelEvent, FullKey, SocketEvent, WireEvent};
pub use pipeline::{Inputs, Pipeline, PipelineConfig, PipelineHandle, PipelineSources};
pub use registry::{combine, Handler, HandlerResult, Registry, RegistryFeed};
pub use stage::{Stage, StageConfig};

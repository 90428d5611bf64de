//! Pipeline assembly
//!
//! Wires the four stages together. The wiring is fixed:
//!
//! ```text
//!   socket ─┐
//!           ├─► [socket] ──► output ──► [effect] ──► effect ──► [dom-effect] ──► dom
//! outgoing ─┘                  │    (output + scroll-restore)      │                  │
//!                              │                                   │                  │
//!                              └──────────────┬────────────────────┴──────────────────┘
//!                                             ▼
//!                                          [log] ──► log (no consumer)
//! ```
//!
//! A [`Pipeline`] is unstarted; [`Pipeline::start`] turns it into a running
//! [`PipelineHandle`]. The socket feed and every inter-stage link are
//! attached in [`Pipeline::new`]. None of them drops events: a full link
//! holds the emitting handler instead.

use std::future::Future;

use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;

use super::config::PipelineConfig;
use super::inputs::Inputs;
use crate::error::Result;
use crate::event::{Channel, ChannelEvent, SocketEvent};
use crate::registry::{combine, constant, EventStream, Registry, RegistryStream};
use crate::stage::{Stage, StageHandle};
use crate::stats::StageSnapshot;

/// Stream of transport-level events
pub type SocketEventStream = BoxStream<'static, SocketEvent>;

/// Outgoing events and the handler registries of every stage
pub struct PipelineSources {
    /// Client-originated events, merged with incoming socket events
    pub outgoing: SocketEventStream,
    /// Registry of the socket stage
    pub socket_handlers: RegistryStream,
    /// Output-effect registry, first half of the effect stage
    pub output_handlers: RegistryStream,
    /// Scroll-restore registry, second half of the effect stage
    pub scroll_restore_handlers: RegistryStream,
    /// Registry of the DOM-effect stage
    pub dom_handlers: RegistryStream,
    /// Registry of the log stage
    pub log_handlers: RegistryStream,
}

impl PipelineSources {
    /// No outgoing events and an empty registry for every stage
    pub fn new() -> Self {
        Self {
            outgoing: stream::pending().boxed(),
            socket_handlers: constant(Registry::new(Channel::Socket)),
            output_handlers: constant(Registry::new(Channel::Effect)),
            scroll_restore_handlers: constant(Registry::new(Channel::Effect)),
            dom_handlers: constant(Registry::new(Channel::DomEffect)),
            log_handlers: constant(Registry::new(Channel::Log)),
        }
    }

    /// Set the outgoing event source
    pub fn outgoing(mut self, outgoing: SocketEventStream) -> Self {
        self.outgoing = outgoing;
        self
    }

    /// Set the socket registry
    pub fn socket_handlers(mut self, registries: RegistryStream) -> Self {
        self.socket_handlers = registries;
        self
    }

    /// Set the output-effect registry
    pub fn output_handlers(mut self, registries: RegistryStream) -> Self {
        self.output_handlers = registries;
        self
    }

    /// Set the scroll-restore registry
    pub fn scroll_restore_handlers(mut self, registries: RegistryStream) -> Self {
        self.scroll_restore_handlers = registries;
        self
    }

    /// Set the DOM-effect registry
    pub fn dom_handlers(mut self, registries: RegistryStream) -> Self {
        self.dom_handlers = registries;
        self
    }

    /// Set the log registry
    pub fn log_handlers(mut self, registries: RegistryStream) -> Self {
        self.log_handlers = registries;
        self
    }
}

impl Default for PipelineSources {
    fn default() -> Self {
        Self::new()
    }
}

/// An assembled, unstarted pipeline
pub struct Pipeline {
    inputs: Inputs,
    sources: PipelineSources,
    incoming: mpsc::UnboundedReceiver<SocketEvent>,
    socket: Stage,
    effect: Stage,
    dom: Stage,
    log: Stage,
    effect_input: EventStream,
    dom_input: EventStream,
    merged_input: [EventStream; 3],
}

impl Pipeline {
    /// Assemble the stages around an inputs bundle
    pub fn new(inputs: Inputs, sources: PipelineSources, config: PipelineConfig) -> Self {
        let mut socket = Stage::new(Channel::Socket, config.socket);
        let mut effect = Stage::new(Channel::Effect, config.effect);
        let mut dom = Stage::new(Channel::DomEffect, config.dom);
        let log = Stage::new(Channel::Log, config.log);

        let incoming = inputs.socket.feed();
        let effect_input = socket.link();
        let dom_input = effect.link();
        let merged_input = [socket.link(), effect.link(), dom.link()];

        Self {
            inputs,
            sources,
            incoming,
            socket,
            effect,
            dom,
            log,
            effect_input,
            dom_input,
            merged_input,
        }
    }

    /// Observe a stage's output before the pipeline starts
    pub fn subscribe(&self, channel: Channel) -> broadcast::Receiver<ChannelEvent> {
        match channel {
            Channel::Socket => self.socket.subscribe(),
            Channel::Effect => self.effect.subscribe(),
            Channel::DomEffect => self.dom.subscribe(),
            Channel::Log => self.log.subscribe(),
        }
    }

    /// Start every stage
    pub fn start(self) -> PipelineHandle {
        let Pipeline {
            inputs,
            sources,
            incoming,
            socket,
            effect,
            dom,
            log,
            effect_input,
            dom_input,
            merged_input,
        } = self;
        let PipelineSources {
            outgoing,
            socket_handlers,
            output_handlers,
            scroll_restore_handlers,
            dom_handlers,
            log_handlers,
        } = sources;

        let cancel = CancellationToken::new();

        let socket_input: EventStream =
            stream::select(UnboundedReceiverStream::new(incoming), outgoing)
                .map(SocketEvent::into_channel_event)
                .boxed();
        let effect_handlers = combine(vec![output_handlers, scroll_restore_handlers]);
        let merged: EventStream = stream::select_all(merged_input).boxed();

        let handle = PipelineHandle {
            socket: socket.spawn(socket_handlers, socket_input, inputs.clone(), cancel.clone()),
            effect: effect.spawn(effect_handlers, effect_input, inputs.clone(), cancel.clone()),
            dom: dom.spawn(dom_handlers, dom_input, inputs.clone(), cancel.clone()),
            log: log.spawn(log_handlers, merged, inputs, cancel.clone()),
            cancel,
        };

        tracing::info!("Pipeline running");
        handle
    }
}

/// A running pipeline
///
/// Dropping the handle leaves the stages running for the life of the
/// runtime; call [`PipelineHandle::stop`] to end them.
pub struct PipelineHandle {
    socket: StageHandle,
    effect: StageHandle,
    dom: StageHandle,
    log: StageHandle,
    cancel: CancellationToken,
}

impl PipelineHandle {
    fn stage(&self, channel: Channel) -> &StageHandle {
        match channel {
            Channel::Socket => &self.socket,
            Channel::Effect => &self.effect,
            Channel::DomEffect => &self.dom,
            Channel::Log => &self.log,
        }
    }

    /// Observe a stage's output from now on
    pub fn subscribe(&self, channel: Channel) -> broadcast::Receiver<ChannelEvent> {
        self.stage(channel).subscribe()
    }

    /// Statistics of one stage
    pub fn stats(&self, channel: Channel) -> StageSnapshot {
        self.stage(channel).stats()
    }

    /// Check that no stage has ended
    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled() && Channel::ALL.iter().all(|c| !self.stage(*c).is_finished())
    }

    /// Stop every stage and wait for them to finish
    pub async fn stop(self) -> Result<()> {
        tracing::info!("Stopping pipeline");
        self.cancel.cancel();

        let results = futures::future::join_all([
            self.socket.join(),
            self.effect.join(),
            self.dom.join(),
            self.log.join(),
        ])
        .await;

        tracing::info!("Pipeline stopped");
        results.into_iter().collect()
    }

    /// Run until `shutdown` resolves, then stop
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        shutdown.await;
        tracing::info!("Shutdown signal received");
        self.stop().await
    }
}

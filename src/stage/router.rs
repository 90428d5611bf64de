//! Stage router
//!
//! One stage binds a channel to a time-varying registry. Its router task
//! pairs every input event with the latest registry snapshot, drops events
//! nobody handles, and hands the rest to per-key groups. Handler outputs are
//! multicast: handlers run once per input event no matter how many
//! consumers there are.
//!
//! Outputs leave a stage two ways. Downstream stages are attached with
//! [`Stage::link`], a bounded queue that never drops: when it is full the
//! emitting handler waits. Observers use [`Stage::subscribe`], a broadcast
//! that lets a slow observer skip events instead of holding anyone up.
//!
//! ```text
//!   input ──► router ──► lookup(latest snapshot) ──► GroupTable ──► handler
//!               ▲              │ miss                                 │
//!   registry ───┘              ▼                                      ▼
//!                            drop                                  Outlets
//!                                                           ├─► link ──► next stage
//!                                                           └─► broadcast ──► observers
//! ```

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::{BroadcastStream, ReceiverStream};
use tokio_util::sync::CancellationToken;

use super::config::StageConfig;
use super::group::{DispatchContext, GroupTable, Job, Outlets};
use crate::error::{Error, Result};
use crate::event::{Channel, ChannelEvent};
use crate::pipeline::Inputs;
use crate::registry::{EventStream, Registry, RegistryStream};
use crate::stats::{StageSnapshot, StageStats};

/// An unstarted stage
///
/// Attach every link and take every subscription you need before
/// [`Stage::spawn`]; events emitted before then are not replayed.
pub struct Stage {
    channel: Channel,
    config: StageConfig,
    output: broadcast::Sender<ChannelEvent>,
    links: Vec<mpsc::Sender<ChannelEvent>>,
    stats: Arc<StageStats>,
}

impl Stage {
    /// Create a stage for a channel
    pub fn new(channel: Channel, config: StageConfig) -> Self {
        let (output, _) = broadcast::channel(config.output_capacity.max(1));

        Self {
            channel,
            config,
            output,
            links: Vec::new(),
            stats: Arc::new(StageStats::new(channel)),
        }
    }

    /// Channel this stage routes
    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Attach a downstream stage's input
    ///
    /// Every output reaches the link in order. A full link makes the
    /// emitting handler wait until the downstream stage catches up.
    pub fn link(&mut self) -> EventStream {
        let (tx, rx) = mpsc::channel(self.config.output_capacity.max(1));
        self.links.push(tx);
        ReceiverStream::new(rx).boxed()
    }

    /// Subscribe to the stage output as an observer
    pub fn subscribe(&self) -> broadcast::Receiver<ChannelEvent> {
        self.output.subscribe()
    }

    /// Subscribe to the stage output as an observer stream
    pub fn output_stream(&self) -> EventStream {
        subscriber_stream(self.channel, self.subscribe())
    }

    /// Start routing `input` through `registries`
    pub fn spawn(
        self,
        registries: RegistryStream,
        input: EventStream,
        inputs: Inputs,
        cancel: CancellationToken,
    ) -> StageHandle {
        let Stage {
            channel,
            config,
            output,
            links,
            stats,
        } = self;

        let ctx = DispatchContext {
            channel,
            inputs,
            output: Outlets {
                observers: output.clone(),
                links,
            },
            stats: Arc::clone(&stats),
            cancel: cancel.clone(),
        };

        let router = Router {
            channel,
            groups: GroupTable::new(ctx, &config),
            stats: Arc::clone(&stats),
            latest: None,
        };

        let task = tokio::spawn(router.run(registries, input, cancel));

        StageHandle {
            channel,
            output,
            stats,
            task,
        }
    }
}

/// A running stage
pub struct StageHandle {
    channel: Channel,
    output: broadcast::Sender<ChannelEvent>,
    stats: Arc<StageStats>,
    task: JoinHandle<()>,
}

impl StageHandle {
    /// Channel this stage routes
    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Subscribe to the stage output from now on
    pub fn subscribe(&self) -> broadcast::Receiver<ChannelEvent> {
        self.output.subscribe()
    }

    /// Current statistics
    pub fn stats(&self) -> StageSnapshot {
        self.stats.snapshot()
    }

    /// Check if the router task has ended
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the router task to end
    pub async fn join(self) -> Result<()> {
        let channel = self.channel;
        self.task.await.map_err(|e| Error::StageTask {
            channel,
            reason: e.to_string(),
        })
    }
}

/// Turn an observer subscription into an event stream
///
/// An observer that falls behind skips what it missed.
pub fn subscriber_stream(channel: Channel, rx: broadcast::Receiver<ChannelEvent>) -> EventStream {
    BroadcastStream::new(rx)
        .filter_map(move |item| async move {
            match item {
                Ok(event) => Some(event),
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        stage = %channel,
                        skipped = skipped,
                        "Subscriber lagged, events skipped"
                    );
                    None
                }
            }
        })
        .boxed()
}

struct Router {
    channel: Channel,
    groups: GroupTable,
    stats: Arc<StageStats>,
    latest: Option<Registry>,
}

impl Router {
    async fn run(
        mut self,
        mut registries: RegistryStream,
        mut input: EventStream,
        cancel: CancellationToken,
    ) {
        tracing::info!(stage = %self.channel, "Stage started");
        let mut registries_open = true;

        loop {
            // Registry updates win ties so an event is paired with the
            // snapshot that was current when it became ready
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                snapshot = registries.next(), if registries_open => match snapshot {
                    Some(snapshot) => self.update_registry(snapshot),
                    None => {
                        registries_open = false;
                        tracing::debug!(stage = %self.channel, "Registry source ended, keeping last snapshot");
                    }
                },
                event = input.next() => match event {
                    Some(event) => self.route(event).await,
                    None => {
                        tracing::debug!(stage = %self.channel, "Stage input ended");
                        break;
                    }
                },
            }
        }

        self.groups.close().await;
        tracing::info!(stage = %self.channel, "Stage stopped");
    }

    fn update_registry(&mut self, snapshot: Registry) {
        tracing::debug!(
            stage = %self.channel,
            handlers = snapshot.len(),
            groups = self.groups.len(),
            "Registry snapshot updated"
        );
        self.latest = Some(snapshot);
    }

    async fn route(&mut self, event: ChannelEvent) {
        self.stats.record_received();

        let handler = match self.latest.as_ref().and_then(|r| r.lookup(&event.key)) {
            Some(handler) => Arc::clone(handler),
            None => {
                self.stats.record_unmatched();
                tracing::trace!(stage = %self.channel, key = %event.key, "No handler, event dropped");
                return;
            }
        };

        self.groups.dispatch(Job { event, handler }).await;
    }
}

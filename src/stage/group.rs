//! Per-key dispatch groups
//!
//! Every distinct [`FullKey`] seen by a stage gets a group: a bounded queue
//! and one worker task that invokes handlers strictly in arrival order.
//! Groups for different keys run independently.
//!
//! Groups are created on first sight of a key and reclaimed in two ways:
//! - the worker retires itself after the idle timeout, finishing anything
//!   already queued;
//! - the table evicts its least recently used group once `max_groups` is
//!   reached. The evicted worker is detached and finishes its queue on its
//!   own; the router never waits for it.
//!
//! A key is never served by two workers at once: a replacement worker
//! awaits its predecessor for the same key before taking its first event.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use futures::{FutureExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::config::StageConfig;
use crate::event::{Channel, ChannelEvent, FullKey};
use crate::pipeline::Inputs;
use crate::registry::Handler;
use crate::stats::StageStats;

/// An event paired with the handler resolved when it arrived
pub(super) struct Job {
    pub event: ChannelEvent,
    pub handler: Arc<dyn Handler>,
}

/// Where a stage's handler outputs go
pub(super) struct Outlets {
    /// Observers; a lagging observer skips events
    pub observers: broadcast::Sender<ChannelEvent>,
    /// Downstream stage inputs; never skip, a full link makes the emitter wait
    pub links: Vec<mpsc::Sender<ChannelEvent>>,
}

impl Outlets {
    async fn emit(&self, event: ChannelEvent) {
        for link in &self.links {
            // Closed once the downstream stage has stopped
            let _ = link.send(event.clone()).await;
        }
        // No observers is fine
        let _ = self.observers.send(event);
    }
}

/// State shared by all groups of one stage
pub(super) struct DispatchContext {
    pub channel: Channel,
    pub inputs: Inputs,
    pub output: Outlets,
    pub stats: Arc<StageStats>,
    pub cancel: CancellationToken,
}

impl DispatchContext {
    /// Invoke one handler and forward its outputs
    ///
    /// Errors and panics, whether raised by the call or while polling the
    /// returned stream, drop this dispatch only.
    async fn dispatch(&self, key: &FullKey, job: Job) {
        let Job { event, handler } = job;

        let invoked = panic::catch_unwind(AssertUnwindSafe(|| {
            handler.handle(&event.payload, &self.inputs)
        }));

        let mut outputs = match invoked {
            Ok(Ok(outputs)) => outputs,
            Ok(Err(err)) => {
                self.stats.record_fault();
                tracing::warn!(
                    stage = %self.channel,
                    key = %key,
                    error = %err,
                    "Handler failed"
                );
                return;
            }
            Err(payload) => {
                self.stats.record_fault();
                tracing::error!(
                    stage = %self.channel,
                    key = %key,
                    panic = %panic_message(payload.as_ref()),
                    "Handler panicked"
                );
                return;
            }
        };

        loop {
            match AssertUnwindSafe(outputs.next()).catch_unwind().await {
                Ok(Some(out)) => {
                    self.stats.record_emitted();
                    self.output.emit(out).await;
                }
                Ok(None) => break,
                Err(payload) => {
                    self.stats.record_fault();
                    tracing::error!(
                        stage = %self.channel,
                        key = %key,
                        panic = %panic_message(payload.as_ref()),
                        "Handler output panicked"
                    );
                    return;
                }
            }
        }

        self.stats.record_dispatched();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

struct Group {
    tx: mpsc::Sender<Job>,
    task: JoinHandle<()>,
    last_used: Instant,
}

/// Live groups of one stage, keyed by full key
pub(super) struct GroupTable {
    groups: HashMap<FullKey, Group>,
    /// Detached workers still finishing their queue
    draining: HashMap<FullKey, JoinHandle<()>>,
    ctx: Arc<DispatchContext>,
    queue_capacity: usize,
    max_groups: usize,
    idle_timeout: Duration,
}

impl GroupTable {
    pub fn new(ctx: DispatchContext, config: &StageConfig) -> Self {
        Self {
            groups: HashMap::new(),
            draining: HashMap::new(),
            ctx: Arc::new(ctx),
            queue_capacity: config.group_queue_capacity.max(1),
            max_groups: config.max_groups.max(1),
            idle_timeout: config.group_idle_timeout,
        }
    }

    /// Queue a job on its key's group, creating the group if needed
    ///
    /// Waits only when this key's queue is full.
    pub async fn dispatch(&mut self, mut job: Job) {
        let key = job.event.key.clone();

        if let Some(group) = self.groups.get_mut(&key) {
            group.last_used = Instant::now();
            match group.tx.send(job).await {
                Ok(()) => return,
                Err(mpsc::error::SendError(returned)) => job = returned,
            }

            // Retired on idle, possibly still finishing its queue
            if let Some(retired) = self.groups.remove(&key) {
                self.draining.insert(key.clone(), retired.task);
            }
        } else if self.groups.len() >= self.max_groups {
            self.evict();
        }

        let group = self.spawn_group(key.clone());
        if group.tx.send(job).await.is_err() {
            tracing::debug!(
                stage = %self.ctx.channel,
                key = %key,
                "Group closed before first event, event dropped"
            );
        }
        self.groups.insert(key, group);
    }

    /// Free at least one slot without waiting on any worker
    fn evict(&mut self) {
        self.groups.retain(|_, group| !group.task.is_finished());
        self.draining.retain(|_, task| !task.is_finished());
        if self.groups.len() < self.max_groups {
            return;
        }

        let oldest = self
            .groups
            .iter()
            .min_by_key(|(_, group)| group.last_used)
            .map(|(key, _)| key.clone());

        if let Some(key) = oldest {
            if let Some(Group { tx, task, .. }) = self.groups.remove(&key) {
                tracing::debug!(
                    stage = %self.ctx.channel,
                    key = %key,
                    max_groups = self.max_groups,
                    "Evicting least recently used group"
                );
                drop(tx);
                self.draining.insert(key, task);
            }
        }
    }

    fn spawn_group(&mut self, key: FullKey) -> Group {
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let predecessor = self.draining.remove(&key);
        self.ctx.stats.group_opened();

        let task = tokio::spawn(run_group(
            key,
            rx,
            Arc::clone(&self.ctx),
            self.idle_timeout,
            predecessor,
        ));

        Group {
            tx,
            task,
            last_used: Instant::now(),
        }
    }

    /// Number of groups currently tracked
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Close every group and wait for queued work to finish
    pub async fn close(mut self) {
        let mut tasks: Vec<JoinHandle<()>> =
            self.groups.drain().map(|(_, group)| group.task).collect();
        tasks.extend(self.draining.drain().map(|(_, task)| task));
        join_all(tasks).await;
    }
}

async fn run_group(
    key: FullKey,
    rx: mpsc::Receiver<Job>,
    ctx: Arc<DispatchContext>,
    idle_timeout: Duration,
    predecessor: Option<JoinHandle<()>>,
) {
    tracing::debug!(stage = %ctx.channel, key = %key, "Group opened");

    let ready = match predecessor {
        Some(previous) => tokio::select! {
            _ = ctx.cancel.cancelled() => false,
            _ = previous => true,
        },
        None => true,
    };

    if ready {
        serve(&key, rx, &ctx, idle_timeout).await;
    }

    ctx.stats.group_closed();
}

async fn serve(
    key: &FullKey,
    mut rx: mpsc::Receiver<Job>,
    ctx: &DispatchContext,
    idle_timeout: Duration,
) {
    loop {
        let next = tokio::select! {
            _ = ctx.cancel.cancelled() => return,
            next = tokio::time::timeout(idle_timeout, rx.recv()) => next,
        };

        match next {
            Ok(Some(job)) => {
                tokio::select! {
                    _ = ctx.cancel.cancelled() => return,
                    _ = ctx.dispatch(key, job) => {}
                }
            }
            Ok(None) => return,
            Err(_) => {
                // Refuse new work, then finish what is already queued
                rx.close();
                while let Some(job) = rx.recv().await {
                    if ctx.cancel.is_cancelled() {
                        return;
                    }
                    ctx.dispatch(key, job).await;
                }
                tracing::debug!(stage = %ctx.channel, key = %key, "Group retired after idle timeout");
                return;
            }
        }
    }
}

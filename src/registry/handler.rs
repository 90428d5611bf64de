//! Handler trait and output helpers
//!
//! A handler receives one event's payload plus the shared [`Inputs`] and
//! returns zero or more output events as a stream. Asynchronous work (e.g.
//! waiting on a socket round-trip) is expressed as a stream that yields
//! later; its events re-enter the pipeline like any other output.

use std::future::Future;

use futures::stream::{self, BoxStream, StreamExt};
use serde_json::Value;

use crate::error::HandlerError;
use crate::event::ChannelEvent;
use crate::pipeline::Inputs;

/// Stream of events produced by a handler or a stage
pub type EventStream = BoxStream<'static, ChannelEvent>;

/// Outcome of invoking a handler
pub type HandlerResult = Result<EventStream, HandlerError>;

/// Callback registered under a key in a [`Registry`](super::Registry)
///
/// Implemented for every `Fn(&Value, &Inputs) -> HandlerResult` closure.
pub trait Handler: Send + Sync + 'static {
    /// Handle one event
    fn handle(&self, payload: &Value, inputs: &Inputs) -> HandlerResult;
}

impl<F> Handler for F
where
    F: Fn(&Value, &Inputs) -> HandlerResult + Send + Sync + 'static,
{
    fn handle(&self, payload: &Value, inputs: &Inputs) -> HandlerResult {
        self(payload, inputs)
    }
}

/// No output events
pub fn none() -> HandlerResult {
    Ok(stream::empty().boxed())
}

/// A single output event
pub fn once(event: ChannelEvent) -> HandlerResult {
    Ok(stream::once(async move { event }).boxed())
}

/// Several output events, emitted in order
pub fn many(events: impl IntoIterator<Item = ChannelEvent>) -> HandlerResult {
    let events: Vec<ChannelEvent> = events.into_iter().collect();
    Ok(stream::iter(events).boxed())
}

/// Output events produced once a future resolves
pub fn later<F>(future: F) -> HandlerResult
where
    F: Future<Output = Vec<ChannelEvent>> + Send + 'static,
{
    Ok(stream::once(future)
        .flat_map(stream::iter)
        .boxed())
}

/// Output events from an arbitrary stream
pub fn stream<S>(events: S) -> HandlerResult
where
    S: futures::Stream<Item = ChannelEvent> + Send + 'static,
{
    Ok(events.boxed())
}

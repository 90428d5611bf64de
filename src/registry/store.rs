//! Registry snapshot
//!
//! A [`Registry`] is one immutable mapping from [`FullKey`] to handler. The
//! time-varying registry of a stage is a stream of these snapshots.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use super::handler::{Handler, HandlerResult};
use crate::event::{Channel, FullKey};
use crate::pipeline::Inputs;

/// Snapshot of the handlers for one stage
///
/// Keys are unique within a snapshot. Looking up an absent key yields `None`;
/// the router treats that as "drop the event", never as an error.
#[derive(Clone)]
pub struct Registry {
    /// Channel used by [`Registry::on`]
    channel: Channel,

    /// Map of full key to handler
    handlers: HashMap<FullKey, Arc<dyn Handler>>,
}

impl Registry {
    /// Create an empty registry for a channel
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            handlers: HashMap::new(),
        }
    }

    /// Channel this registry was built for
    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Register a closure under `key` on this registry's channel
    pub fn on<F>(self, key: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Value, &Inputs) -> HandlerResult + Send + Sync + 'static,
    {
        self.on_handler(key, handler)
    }

    /// Register a [`Handler`] implementation under `key`
    pub fn on_handler(mut self, key: impl Into<String>, handler: impl Handler) -> Self {
        let key = FullKey::new(self.channel, key);
        self.handlers.insert(key, Arc::new(handler));
        self
    }

    /// Insert a shared handler under an explicit full key
    ///
    /// Replaces and returns any handler already registered there.
    pub fn insert(&mut self, key: FullKey, handler: Arc<dyn Handler>) -> Option<Arc<dyn Handler>> {
        self.handlers.insert(key, handler)
    }

    /// Look up the handler for an exact full key
    pub fn lookup(&self, key: &FullKey) -> Option<&Arc<dyn Handler>> {
        self.handlers.get(key)
    }

    /// Check whether a handler is registered
    pub fn contains(&self, key: &FullKey) -> bool {
        self.handlers.contains_key(key)
    }

    /// Registered keys, in no particular order
    pub fn keys(&self) -> impl Iterator<Item = &FullKey> {
        self.handlers.keys()
    }

    /// Number of registered handlers
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Check if no handlers are registered
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Shallow-merge `other` into this snapshot; `other` wins on collision
    pub fn merge(&mut self, other: &Registry) {
        for (key, handler) in &other.handlers {
            self.handlers.insert(key.clone(), Arc::clone(handler));
        }
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<String> = self.handlers.keys().map(ToString::to_string).collect();
        keys.sort();

        f.debug_struct("Registry")
            .field("channel", &self.channel)
            .field("keys", &keys)
            .finish()
    }
}

//! Time-varying registries
//!
//! Collaborators publish full snapshots, never deltas. A stage only ever
//! reads the most recent one.

use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::store::Registry;

/// Stream of registry snapshots
pub type RegistryStream = BoxStream<'static, Registry>;

/// A registry that never changes
///
/// Emits once and then stays open, like a behaviour value that never
/// completes.
pub fn constant(registry: Registry) -> RegistryStream {
    stream::once(async move { registry })
        .chain(stream::pending())
        .boxed()
}

/// Publisher side of a changing registry
///
/// The initial snapshot is always the first emission, so a stage fed by a
/// feed can never stall waiting for a first value.
#[derive(Debug, Clone)]
pub struct RegistryFeed {
    tx: mpsc::UnboundedSender<Registry>,
}

impl RegistryFeed {
    /// Create a feed and the stream it drives
    pub fn new(initial: Registry) -> (Self, RegistryStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        // Receiver is alive, so the first send cannot fail
        let _ = tx.send(initial);

        (Self { tx }, UnboundedReceiverStream::new(rx).boxed())
    }

    /// Publish a new snapshot
    ///
    /// Returns false once the consuming stage has gone away.
    pub fn publish(&self, registry: Registry) -> bool {
        let channel = registry.channel();
        let handlers = registry.len();

        if self.tx.send(registry).is_err() {
            return false;
        }

        tracing::debug!(
            channel = %channel,
            handlers = handlers,
            "Registry snapshot published"
        );
        true
    }
}

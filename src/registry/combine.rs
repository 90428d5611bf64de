//! Registry combination
//!
//! Several collaborators can contribute handlers to the same stage without
//! knowing about each other. Their registries are joined tick by tick: the
//! combined stream emits only once every source has produced a new snapshot
//! (a zipping join), and each emission is the shallow merge of those
//! snapshots in source order.

use futures::future::join_all;
use futures::stream::{self, StreamExt};

use super::source::RegistryStream;
use super::store::Registry;

/// Combine registries into one
///
/// Later sources override earlier ones on key collision. If any source ends,
/// the combined stream ends; if any source never emits, neither does the
/// combined stream. An empty source list yields an empty stream.
pub fn combine(sources: Vec<RegistryStream>) -> RegistryStream {
    stream::unfold(sources, |mut sources| async move {
        if sources.is_empty() {
            return None;
        }

        let ticks = join_all(sources.iter_mut().map(|source| source.next())).await;

        let mut snapshots = Vec::with_capacity(ticks.len());
        for tick in ticks {
            match tick {
                Some(snapshot) => snapshots.push(snapshot),
                None => return None,
            }
        }

        let merged = match merge_snapshots(snapshots) {
            Some(merged) => merged,
            None => return None,
        };
        tracing::debug!(
            channel = %merged.channel(),
            sources = sources.len(),
            handlers = merged.len(),
            "Combined registry emitted"
        );

        Some((merged, sources))
    })
    .boxed()
}

/// Merge snapshots in order; later snapshots win
fn merge_snapshots(snapshots: Vec<Registry>) -> Option<Registry> {
    snapshots.into_iter().reduce(|mut merged, snapshot| {
        merged.merge(&snapshot);
        merged
    })
}

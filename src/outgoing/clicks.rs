//! Outgoing click capture
//!
//! Local clicks become `@@outgoing/click` events. A click received from
//! another browser closes the [`SyncGate`] for a short window so replaying
//! it locally does not bounce straight back to the server.

use std::future;
use std::time::Duration;

use futures::stream::{self, PollNext, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tokio_stream::wrappers::BroadcastStream;

use super::gate::SyncGate;
use crate::event::SocketEvent;
use crate::pipeline::SocketEventStream;

/// Name of a click mirrored from another browser
pub const INCOMING_CLICK: &str = "browser:click";

/// Name of a local click on its way to the server
pub const OUTGOING_CLICK: &str = "@@outgoing/click";

/// Identifies a clicked element across browsers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementData {
    /// Element tag, e.g. "A"
    pub tag_name: String,
    /// Position among elements with the same tag
    pub index: usize,
}

impl ElementData {
    /// Create element data
    pub fn new(tag_name: impl Into<String>, index: usize) -> Self {
        Self {
            tag_name: tag_name.into(),
            index,
        }
    }
}

enum Signal {
    Local(ElementData),
    Remote,
}

/// Forward local clicks unless a remote click arrived within `window`
///
/// A remote click is always taken before a local one that is ready at the
/// same time, so the local replay of a mirrored click finds the gate closed.
pub fn click_stream<S>(
    local: S,
    incoming: broadcast::Receiver<SocketEvent>,
    window: Duration,
) -> SocketEventStream
where
    S: Stream<Item = ElementData> + Send + 'static,
{
    let remote = BroadcastStream::new(incoming).filter_map(|item| {
        future::ready(match item {
            Ok(event) if event.name == INCOMING_CLICK => Some(Signal::Remote),
            _ => None,
        })
    });

    stream::select_with_strategy(remote, local.map(Signal::Local), |_: &mut ()| PollNext::Left)
        .scan(SyncGate::new(window), |gate, signal| {
            let now = Instant::now();
            let out = match signal {
                Signal::Remote => {
                    gate.close(now);
                    None
                }
                Signal::Local(element) if gate.is_open(now) => Some(outgoing_click(&element)),
                Signal::Local(element) => {
                    tracing::trace!(tag = %element.tag_name, index = element.index, "Click suppressed, remote click in window");
                    None
                }
            };
            future::ready(Some(out))
        })
        .filter_map(future::ready)
        .boxed()
}

fn outgoing_click(element: &ElementData) -> SocketEvent {
    SocketEvent::new(
        OUTGOING_CLICK,
        json!({
            "tagName": element.tag_name,
            "index": element.index,
        }),
    )
}

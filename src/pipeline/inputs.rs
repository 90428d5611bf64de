//! Inputs bundle
//!
//! The long-lived sources every handler receives. The bundle is built once
//! and never changes shape; only the option store's value varies.

use std::any::Any;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{broadcast, mpsc};

use super::options::OptionStore;
use crate::event::SocketEvent;

/// Both directions of the socket transport
///
/// The transport pushes what it receives with [`SocketHandle::deliver`] and
/// drains the outbound receiver returned by [`SocketHandle::new`]. Handlers
/// talk back to the server with [`SocketHandle::emit`].
///
/// Incoming events reach two kinds of readers: feeds ([`SocketHandle::feed`])
/// get every event, subscribers ([`SocketHandle::subscribe`]) skip events
/// once they fall `capacity` behind.
#[derive(Debug, Clone)]
pub struct SocketHandle {
    incoming: broadcast::Sender<SocketEvent>,
    feeds: Arc<Mutex<Vec<mpsc::UnboundedSender<SocketEvent>>>>,
    outbound: mpsc::UnboundedSender<SocketEvent>,
}

impl SocketHandle {
    /// Create a handle; the receiver carries events bound for the server
    pub fn new(capacity: usize) -> (Self, mpsc::UnboundedReceiver<SocketEvent>) {
        let (incoming, _) = broadcast::channel(capacity.max(1));
        let (outbound, rx) = mpsc::unbounded_channel();

        let handle = Self {
            incoming,
            feeds: Arc::new(Mutex::new(Vec::new())),
            outbound,
        };
        (handle, rx)
    }

    /// Hand an event received from the server to every feed and subscriber
    ///
    /// Returns the number of readers reached.
    pub fn deliver(&self, event: SocketEvent) -> usize {
        let mut reached = 0;
        {
            let mut feeds = self.feeds.lock().unwrap_or_else(|e| e.into_inner());
            feeds.retain(|feed| feed.send(event.clone()).is_ok());
            reached += feeds.len();
        }
        reached + self.incoming.send(event).unwrap_or(0)
    }

    /// Receive every incoming event from now on, without loss
    pub fn feed(&self) -> mpsc::UnboundedReceiver<SocketEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.feeds
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(tx);
        rx
    }

    /// Subscribe to events received from the server
    pub fn subscribe(&self) -> broadcast::Receiver<SocketEvent> {
        self.incoming.subscribe()
    }

    /// Send an event to the server
    ///
    /// Returns false once the transport has shut down.
    pub fn emit(&self, name: impl Into<String>, payload: Value) -> bool {
        let event = SocketEvent::new(name, payload);
        match self.outbound.send(event) {
            Ok(()) => true,
            Err(mpsc::error::SendError(event)) => {
                tracing::debug!(name = %event.name, "Transport closed, outbound event dropped");
                false
            }
        }
    }
}

/// In-page notification request
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    /// Message to show
    pub message: String,
    /// How long to show it
    pub timeout: Duration,
}

/// Queue feeding the notification UI
#[derive(Debug, Clone)]
pub struct NotifyHandle {
    tx: mpsc::UnboundedSender<Notification>,
}

impl NotifyHandle {
    /// Create a handle and the receiver the UI drains
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Handle whose notifications go nowhere
    pub fn disconnected() -> Self {
        Self::new().0
    }

    /// Request a notification
    pub fn flash(&self, message: impl Into<String>, timeout: Duration) -> bool {
        self.tx
            .send(Notification {
                message: message.into(),
                timeout,
            })
            .is_ok()
    }
}

/// Shared read-only sources passed to every handler
///
/// Cheap to clone; all fields are handles.
#[derive(Clone)]
pub struct Inputs {
    /// Socket transport
    pub socket: SocketHandle,
    /// Current client options
    pub options: OptionStore,
    /// Notification UI
    pub notify: NotifyHandle,
    /// Host environment (window, document, navigator equivalents)
    host: Arc<dyn Any + Send + Sync>,
}

impl Inputs {
    /// Bundle a socket and options with no notification UI or host
    pub fn new(socket: SocketHandle, options: OptionStore) -> Self {
        Self {
            socket,
            options,
            notify: NotifyHandle::disconnected(),
            host: Arc::new(()),
        }
    }

    /// Attach the notification UI
    pub fn with_notify(mut self, notify: NotifyHandle) -> Self {
        self.notify = notify;
        self
    }

    /// Attach the host environment
    pub fn with_host<T: Any + Send + Sync>(mut self, host: T) -> Self {
        self.host = Arc::new(host);
        self
    }

    /// Host environment, if it is a `T`
    pub fn host<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.host.downcast_ref::<T>()
    }
}

impl std::fmt::Debug for Inputs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inputs")
            .field("socket", &self.socket)
            .field("options", &self.options.get())
            .field("notify", &self.notify)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, PartialEq)]
    struct Page {
        url: &'static str,
    }

    #[test]
    fn test_socket_emit_reaches_transport() {
        let (socket, mut outbound) = SocketHandle::new(8);

        assert!(socket.emit("browser:click", json!({"tagName": "A", "index": 2})));

        let sent = outbound.try_recv().unwrap();
        assert_eq!(sent.name, "browser:click");
        assert_eq!(sent.payload["index"], 2);
    }

    #[test]
    fn test_socket_emit_after_transport_closed() {
        let (socket, outbound) = SocketHandle::new(8);
        drop(outbound);
        assert!(!socket.emit("browser:reload", json!(null)));
    }

    #[test]
    fn test_deliver_fans_out() {
        let (socket, _outbound) = SocketHandle::new(8);
        let mut first = socket.subscribe();
        let mut second = socket.subscribe();

        assert_eq!(socket.deliver(SocketEvent::new("connection", json!({}))), 2);
        assert_eq!(first.try_recv().unwrap().name, "connection");
        assert_eq!(second.try_recv().unwrap().name, "connection");
    }

    #[test]
    fn test_feed_keeps_every_event() {
        let (socket, _outbound) = SocketHandle::new(2);
        let mut feed = socket.feed();
        let mut lagging = socket.subscribe();

        for i in 0..10 {
            socket.deliver(SocketEvent::new("tick", json!(i)));
        }

        for i in 0..10 {
            assert_eq!(feed.try_recv().unwrap().payload, json!(i));
        }
        assert!(matches!(
            lagging.try_recv(),
            Err(broadcast::error::TryRecvError::Lagged(8))
        ));
    }

    #[test]
    fn test_dropped_feed_is_pruned() {
        let (socket, _outbound) = SocketHandle::new(2);
        let feed = socket.feed();
        let _kept = socket.feed();
        drop(feed);

        assert_eq!(socket.deliver(SocketEvent::new("tick", json!(0))), 1);
    }

    #[test]
    fn test_host_lookup_by_type() {
        let (socket, _outbound) = SocketHandle::new(8);
        let inputs = Inputs::new(socket, OptionStore::default()).with_host(Page { url: "/" });

        assert_eq!(inputs.host::<Page>(), Some(&Page { url: "/" }));
        assert!(inputs.host::<String>().is_none());
    }

    #[test]
    fn test_notify_queue() {
        let (notify, mut rx) = NotifyHandle::new();
        assert!(notify.flash("Connected", Duration::from_secs(2)));

        let note = rx.try_recv().unwrap();
        assert_eq!(note.message, "Connected");
        assert_eq!(note.timeout, Duration::from_secs(2));
    }
}

//! Client options and the option store
//!
//! Options arrive from the dev server already parsed. Handlers read the
//! current value by snapshot; nothing in the router locks on them.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Which interactions are mirrored between browsers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GhostMode {
    pub clicks: bool,
    pub scroll: bool,
    pub forms: bool,
    pub location: bool,
}

impl Default for GhostMode {
    fn default() -> Self {
        Self {
            clicks: true,
            scroll: true,
            forms: true,
            location: false,
        }
    }
}

/// Options the client runs with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientOptions {
    /// Show in-page notifications
    pub notify: bool,
    /// Minimum level log handlers should surface
    pub log_level: String,
    /// Prefix on every client log line
    pub log_prefix: String,
    /// Mirrored interactions
    pub ghost_mode: GhostMode,
    /// How scroll position survives a reload ("window.name" or "cookie")
    pub scroll_restore_technique: String,
    /// Reload the page when the server restarts
    pub reload_on_restart: bool,
    /// Milliseconds to wait before injecting changed files
    pub reload_delay: u64,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            notify: true,
            log_level: "info".to_string(),
            log_prefix: "Browsersync".to_string(),
            ghost_mode: GhostMode::default(),
            scroll_restore_technique: "window.name".to_string(),
            reload_on_restart: false,
            reload_delay: 0,
        }
    }
}

/// Latest-value container for [`ClientOptions`]
///
/// Clones share the same cell.
#[derive(Debug, Clone)]
pub struct OptionStore {
    tx: Arc<watch::Sender<Arc<ClientOptions>>>,
}

impl OptionStore {
    /// Create a store holding `options`
    pub fn new(options: ClientOptions) -> Self {
        let (tx, _) = watch::channel(Arc::new(options));
        Self { tx: Arc::new(tx) }
    }

    /// Current options
    pub fn get(&self) -> Arc<ClientOptions> {
        Arc::clone(&self.tx.borrow())
    }

    /// Replace the options
    pub fn set(&self, options: ClientOptions) {
        self.tx.send_replace(Arc::new(options));
        tracing::debug!("Client options replaced");
    }

    /// Modify the options in place
    pub fn update(&self, f: impl FnOnce(&mut ClientOptions)) {
        self.tx.send_modify(|current| f(Arc::make_mut(current)));
    }

    /// Watch for changes
    pub fn watch(&self) -> watch::Receiver<Arc<ClientOptions>> {
        self.tx.subscribe()
    }
}

impl Default for OptionStore {
    fn default() -> Self {
        Self::new(ClientOptions::default())
    }
}

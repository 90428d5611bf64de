//! Pipeline assembly and the inputs bundle
//!
//! The pipeline is an explicit value: build it from an [`Inputs`] bundle and
//! the registry sources, subscribe to whatever you want to observe, then
//! start it. The returned handle owns the termination condition.

pub mod assembly;
pub mod config;
pub mod inputs;
pub mod options;

pub use assembly::{Pipeline, PipelineHandle, PipelineSources, SocketEventStream};
pub use config::PipelineConfig;
pub use inputs::{Inputs, Notification, NotifyHandle, SocketHandle};
pub use options::{ClientOptions, GhostMode, OptionStore};

/// Inputs with a detached transport, for unit tests
#[cfg(test)]
pub(crate) fn test_inputs() -> Inputs {
    let (socket, _outbound) = SocketHandle::new(16);
    Inputs::new(socket, OptionStore::default())
}

//! Stage configuration

use std::time::Duration;

/// Default capacity of a stage's multicast output and of each downstream link
pub const DEFAULT_OUTPUT_CAPACITY: usize = 1024;

/// Default per-key queue depth
pub const DEFAULT_GROUP_QUEUE: usize = 64;

/// Default limit on live per-key groups
pub const DEFAULT_MAX_GROUPS: usize = 256;

/// Stage configuration options
#[derive(Debug, Clone)]
pub struct StageConfig {
    /// Buffered events per observer before it starts lagging, and per
    /// downstream link before the emitting handler waits
    pub output_capacity: usize,

    /// Queued events per key before the router waits on that key
    pub group_queue_capacity: usize,

    /// Maximum live groups; the least recently used one is evicted past this
    pub max_groups: usize,

    /// A group with no events for this long retires
    pub group_idle_timeout: Duration,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            output_capacity: DEFAULT_OUTPUT_CAPACITY,
            group_queue_capacity: DEFAULT_GROUP_QUEUE,
            max_groups: DEFAULT_MAX_GROUPS,
            group_idle_timeout: Duration::from_secs(30),
        }
    }
}

impl StageConfig {
    /// Set output capacity
    pub fn output_capacity(mut self, capacity: usize) -> Self {
        self.output_capacity = capacity.max(1);
        self
    }

    /// Set per-key queue depth
    pub fn group_queue_capacity(mut self, capacity: usize) -> Self {
        self.group_queue_capacity = capacity.max(1);
        self
    }

    /// Set maximum live groups
    pub fn max_groups(mut self, max: usize) -> Self {
        self.max_groups = max.max(1);
        self
    }

    /// Set group idle timeout
    pub fn group_idle_timeout(mut self, timeout: Duration) -> Self {
        self.group_idle_timeout = timeout;
        self
    }
}

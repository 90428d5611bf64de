//! Statistics and metrics for pipeline stages

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::event::Channel;

/// Live counters for one stage
///
/// Updated by the router and its group workers; read through
/// [`StageStats::snapshot`].
#[derive(Debug)]
pub struct StageStats {
    channel: Channel,
    started_at: Instant,
    received: AtomicU64,
    unmatched: AtomicU64,
    dispatched: AtomicU64,
    emitted: AtomicU64,
    faults: AtomicU64,
    active_groups: AtomicU64,
}

impl StageStats {
    /// Create zeroed counters for a stage
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            started_at: Instant::now(),
            received: AtomicU64::new(0),
            unmatched: AtomicU64::new(0),
            dispatched: AtomicU64::new(0),
            emitted: AtomicU64::new(0),
            faults: AtomicU64::new(0),
            active_groups: AtomicU64::new(0),
        }
    }

    pub(crate) fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_unmatched(&self) {
        self.unmatched.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dispatched(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_emitted(&self) {
        self.emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_fault(&self) {
        self.faults.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn group_opened(&self) {
        self.active_groups.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn group_closed(&self) {
        self.active_groups.fetch_sub(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of the counters
    pub fn snapshot(&self) -> StageSnapshot {
        StageSnapshot {
            channel: self.channel,
            uptime: self.started_at.elapsed(),
            received: self.received.load(Ordering::Relaxed),
            unmatched: self.unmatched.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            emitted: self.emitted.load(Ordering::Relaxed),
            faults: self.faults.load(Ordering::Relaxed),
            active_groups: self.active_groups.load(Ordering::Relaxed),
        }
    }
}

/// Stage statistics at one point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSnapshot {
    /// Channel the stage routes
    pub channel: Channel,
    /// Time since the stage was created
    pub uptime: Duration,
    /// Events read from the stage input
    pub received: u64,
    /// Events dropped for lack of a handler
    pub unmatched: u64,
    /// Handler invocations that completed without fault
    pub dispatched: u64,
    /// Events emitted on the stage output
    pub emitted: u64,
    /// Handler invocations that failed or panicked
    pub faults: u64,
    /// Per-key groups currently alive
    pub active_groups: u64,
}

impl StageSnapshot {
    /// Share of received events that matched a handler
    pub fn match_ratio(&self) -> f64 {
        if self.received > 0 {
            (self.received - self.unmatched) as f64 / self.received as f64
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_stats_new() {
        let stats = StageStats::new(Channel::Effect).snapshot();
        assert_eq!(stats.channel, Channel::Effect);
        assert_eq!(stats.received, 0);
        assert_eq!(stats.unmatched, 0);
        assert_eq!(stats.dispatched, 0);
        assert_eq!(stats.emitted, 0);
        assert_eq!(stats.faults, 0);
        assert_eq!(stats.active_groups, 0);
    }

    #[test]
    fn test_stage_stats_counts() {
        let stats = StageStats::new(Channel::Socket);
        stats.record_received();
        stats.record_received();
        stats.record_unmatched();
        stats.record_dispatched();
        stats.record_emitted();
        stats.record_emitted();
        stats.group_opened();
        stats.group_opened();
        stats.group_closed();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.received, 2);
        assert_eq!(snapshot.unmatched, 1);
        assert_eq!(snapshot.dispatched, 1);
        assert_eq!(snapshot.emitted, 2);
        assert_eq!(snapshot.active_groups, 1);
    }

    #[test]
    fn test_match_ratio() {
        let stats = StageStats::new(Channel::Log);
        assert_eq!(stats.snapshot().match_ratio(), 0.0);

        for _ in 0..4 {
            stats.record_received();
        }
        stats.record_unmatched();

        assert_eq!(stats.snapshot().match_ratio(), 0.75);
    }
}

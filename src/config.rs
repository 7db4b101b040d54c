/// Synchronizer configuration
use std::time::Duration;

/// Tuning knobs for one conversation synchronizer.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Fixed interval between incremental fetches. Must comfortably exceed
    /// the expected round-trip so poll cycles do not overlap in practice.
    pub poll_interval: Duration,

    /// Maximum number of messages requested on a history load.
    pub history_limit: usize,

    /// Capacity of the sync-event broadcast channel.
    pub event_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            history_limit: 50,
            event_capacity: 64,
        }
    }
}

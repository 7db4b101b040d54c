/// Process-wide unread counters, keyed by peer identity
use parking_lot::Mutex;
use std::collections::HashMap;

/// Shared unread-badge store. One instance lives for the session and is
/// injected into each synchronizer; there is no ambient global and no
/// persistence — counts are rebuilt from live increments only.
#[derive(Debug, Default)]
pub struct UnreadTracker {
    counts: Mutex<HashMap<String, u64>>,
}

impl UnreadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self, peer_id: &str) {
        let mut counts = self.counts.lock();
        *counts.entry(peer_id.to_string()).or_insert(0) += 1;
    }

    /// Resets a peer's count, e.g. when their conversation is opened.
    pub fn clear(&self, peer_id: &str) {
        self.counts.lock().insert(peer_id.to_string(), 0);
    }

    pub fn get(&self, peer_id: &str) -> u64 {
        self.counts.lock().get(peer_id).copied().unwrap_or(0)
    }
}

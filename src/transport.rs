/// Collaborator contract over the marketplace REST client
use crate::error::Result;
use crate::types::Message;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Narrow interface the synchronizer consumes. Transport, auth and retry
/// behavior are owned by the implementor; failures surface to the
/// synchronizer as `ChatError::Transport`.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// The most recent `count` messages between self and `peer_id`, in any
    /// order (the synchronizer sorts).
    async fn fetch_history(&self, peer_id: &str, count: usize) -> Result<Vec<Message>>;

    /// Messages strictly newer than `since` between self and `peer_id`.
    async fn fetch_since(&self, peer_id: &str, since: DateTime<Utc>) -> Result<Vec<Message>>;

    /// Sends `content` to `peer_id`; returns the server-confirmed record
    /// including the assigned id and timestamp.
    async fn send_message(&self, peer_id: &str, content: &str) -> Result<Message>;
}

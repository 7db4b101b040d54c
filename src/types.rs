/// Shared types for the chat synchronization layer
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reserved prefix marking a client-generated temporary id. Server ids never
/// carry it, so an optimistic id can never collide with a confirmed one.
pub const OPTIMISTIC_ID_PREFIX: &str = "pending:";

/// Prefix for session-local ids synthesized for server records that arrive
/// without an id. Such records are rendered but never deduplicated.
pub const LOCAL_ID_PREFIX: &str = "local:";

/// Delivery status of a message in the local set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    /// Present in the authoritative server log.
    #[default]
    Confirmed,
    /// Locally inserted, awaiting server confirmation.
    Optimistic,
    /// Send failed; kept visible with a failed marker.
    Failed,
}

/// One chat message between two identities.
///
/// Wire format is camelCase JSON with an RFC3339 timestamp, matching the
/// marketplace REST backend. A record may legitimately arrive without an id
/// (`id` deserializes to empty); see `ConversationState` for how those are
/// handled.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(default)]
    pub id: String,
    pub sender_id: String,
    pub recipient_id: String,
    pub content: String,
    /// Ordering key and incremental-fetch watermark.
    pub timestamp: DateTime<Utc>,
    /// Listing this conversation is scoped to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listing_id: Option<String>,
    #[serde(default)]
    pub status: MessageStatus,
}

impl Message {
    pub fn is_optimistic(&self) -> bool {
        self.status == MessageStatus::Optimistic
    }

    pub fn is_failed(&self) -> bool {
        self.status == MessageStatus::Failed
    }
}

/// Events broadcast by a synchronizer so UIs can render declaratively.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncEvent {
    /// A poll cycle admitted a new peer-authored message.
    MessageReceived { message: Message },
    /// An optimistic send was confirmed by the server.
    MessageSent { message: Message },
    /// A send failed; the message stays visible with a failed marker.
    SendFailed { temp_id: String },
    /// A history load finished.
    HistoryLoaded { count: usize },
}

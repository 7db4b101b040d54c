/// ChatLink — client-side message synchronization core
///
/// A polling-based reconciliation engine for a two-party chat: it merges an
/// authoritative server message log with locally-issued optimistic sends,
/// deduplicates by message identity, and keeps a per-conversation watermark
/// that drives incremental fetches and unread-count badges. Transport, auth
/// and the REST endpoints themselves are external collaborators consumed
/// through the `ChatTransport` trait.

pub mod error;
pub mod config;
pub mod types;
pub mod transport;
pub mod conversation;
pub mod sync;
pub mod unread;

pub use config::SyncConfig;
pub use error::{ChatError, Result};
pub use sync::{ConversationSync, LifecycleState};
pub use transport::ChatTransport;
pub use types::{Message, MessageStatus, SyncEvent};
pub use unread::UnreadTracker;

/// Per-conversation message set: ordered view, dedup set, watermark
use crate::types::{Message, MessageStatus, LOCAL_ID_PREFIX};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::warn;
use uuid::Uuid;

/// In-memory state for one conversation. Messages are kept ascending by
/// timestamp with a stable tie-break (equal timestamps preserve insertion
/// order); `known_ids` holds every identity ever admitted and guards against
/// the server re-returning rows at the watermark boundary.
#[derive(Debug, Default)]
pub struct ConversationState {
    messages: Vec<Message>,
    known_ids: HashSet<String>,
    watermark: DateTime<Utc>,
    history_unavailable: bool,
}

impl ConversationState {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            known_ids: HashSet::new(),
            watermark: DateTime::<Utc>::UNIX_EPOCH,
            history_unavailable: false,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Exclusive lower bound for the next incremental fetch. Never moves
    /// backward over the lifetime of the state.
    pub fn watermark(&self) -> DateTime<Utc> {
        self.watermark
    }

    pub fn history_unavailable(&self) -> bool {
        self.history_unavailable
    }

    pub(crate) fn set_history_unavailable(&mut self, unavailable: bool) {
        self.history_unavailable = unavailable;
    }

    /// Replaces the whole set from a freshly loaded history batch: resets the
    /// dedup set, sorts ascending and recomputes the watermark. A record
    /// without an id is still rendered, under a synthesized session-local id,
    /// but stays out of `known_ids` since it can never match a later fetch.
    pub fn replace_from_history(&mut self, mut batch: Vec<Message>) {
        batch.sort_by_key(|m| m.timestamp);
        self.known_ids.clear();
        for msg in &mut batch {
            if msg.id.is_empty() {
                warn!(
                    sender = %msg.sender_id,
                    "history message missing id; assigned session-local id"
                );
                msg.id = format!("{}{}", LOCAL_ID_PREFIX, Uuid::new_v4());
            } else {
                self.known_ids.insert(msg.id.clone());
            }
        }
        self.watermark = batch
            .last()
            .map(|m| m.timestamp)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        self.messages = batch;
        self.history_unavailable = false;
    }

    /// Admits one incrementally fetched message. Returns false for records
    /// already known or lacking an id. Advances the watermark when the
    /// admitted timestamp exceeds it.
    pub fn admit(&mut self, msg: Message) -> bool {
        if msg.id.is_empty() || self.known_ids.contains(&msg.id) {
            return false;
        }
        self.known_ids.insert(msg.id.clone());
        let ts = msg.timestamp;
        self.insert_sorted(msg);
        if ts > self.watermark {
            self.watermark = ts;
        }
        true
    }

    /// Inserts a locally-issued optimistic message. Its temporary id joins
    /// `known_ids` so the invariant "every rendered id is unique" holds.
    pub fn insert_optimistic(&mut self, msg: Message) {
        self.known_ids.insert(msg.id.clone());
        self.insert_sorted(msg);
    }

    /// Swaps an optimistic record for the server-confirmed one: the temporary
    /// id is retired, the server id joins `known_ids`, and the watermark
    /// advances if the confirmed timestamp exceeds it — so the next poll does
    /// not re-deliver the just-sent message as new. Returns the stored record,
    /// or None if the temporary id is no longer present.
    pub fn confirm(&mut self, temp_id: &str, confirmed: Message) -> Option<Message> {
        let pos = self.messages.iter().position(|m| m.id == temp_id)?;
        self.messages.remove(pos);
        self.known_ids.remove(temp_id);

        let mut record = confirmed;
        record.status = MessageStatus::Confirmed;
        self.known_ids.insert(record.id.clone());
        if record.timestamp > self.watermark {
            self.watermark = record.timestamp;
        }
        self.insert_sorted(record.clone());
        Some(record)
    }

    /// Marks an optimistic message as failed; it stays visible so the user
    /// can see and retry it. Returns false if the id is no longer present.
    pub fn mark_failed(&mut self, temp_id: &str) -> bool {
        match self.messages.iter_mut().find(|m| m.id == temp_id) {
            Some(msg) => {
                msg.status = MessageStatus::Failed;
                true
            }
            None => false,
        }
    }

    /// Discards all in-memory state (teardown).
    pub fn clear(&mut self) {
        self.messages.clear();
        self.known_ids.clear();
        self.watermark = DateTime::<Utc>::UNIX_EPOCH;
        self.history_unavailable = false;
    }

    // Equal timestamps land after existing entries, preserving insertion order.
    fn insert_sorted(&mut self, msg: Message) {
        let idx = self
            .messages
            .partition_point(|m| m.timestamp <= msg.timestamp);
        self.messages.insert(idx, msg);
    }
}

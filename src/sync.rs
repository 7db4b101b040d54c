/// Conversation synchronizer: history load, incremental polling,
/// optimistic sends and reconciliation with the server log.
use crate::config::SyncConfig;
use crate::conversation::ConversationState;
use crate::error::{ChatError, Result};
use crate::transport::ChatTransport;
use crate::types::{Message, MessageStatus, SyncEvent, OPTIMISTIC_ID_PREFIX};
use crate::unread::UnreadTracker;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Poll-loop lifecycle. `Stopped` is terminal: a torn-down synchronizer
/// never polls again and rejects further sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    Polling,
    Stopped,
}

// Process-wide counter; the prefix keeps temp ids disjoint from server ids.
static NEXT_TEMP_SEQ: AtomicU64 = AtomicU64::new(1);

fn next_temp_id() -> String {
    format!(
        "{}{}",
        OPTIMISTIC_ID_PREFIX,
        NEXT_TEMP_SEQ.fetch_add(1, Ordering::Relaxed)
    )
}

/// Owns the message set for one (self, peer) conversation. Drives periodic
/// incremental fetches, merges results with the optimistic send queue and
/// exposes a de-duplicated, time-ordered view.
///
/// Every await on the transport captures the generation counter first and
/// re-checks it under the state write lock afterwards; teardown and history
/// reload bump the counter, so a slow response landing after either event is
/// discarded instead of mutating state that has moved on.
#[derive(Clone)]
pub struct ConversationSync {
    self_id: String,
    peer_id: String,
    listing_id: Option<String>,
    transport: Arc<dyn ChatTransport>,
    unread: Arc<UnreadTracker>,
    config: SyncConfig,
    state: Arc<RwLock<ConversationState>>,
    lifecycle: Arc<RwLock<LifecycleState>>,
    generation: Arc<AtomicU64>,
    events: broadcast::Sender<SyncEvent>,
    poll_task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl ConversationSync {
    /// Creates a synchronizer for the (self, peer) pair. `self_id` comes from
    /// the external session provider and must be stable for this instance's
    /// lifetime. Fails with `InvalidParticipants` if either id is blank.
    pub fn new(
        self_id: impl Into<String>,
        peer_id: impl Into<String>,
        transport: Arc<dyn ChatTransport>,
        unread: Arc<UnreadTracker>,
        config: SyncConfig,
    ) -> Result<Self> {
        let self_id = self_id.into();
        let peer_id = peer_id.into();
        if self_id.trim().is_empty() || peer_id.trim().is_empty() {
            return Err(ChatError::InvalidParticipants);
        }

        let (events, _) = broadcast::channel(config.event_capacity);
        Ok(Self {
            self_id,
            peer_id,
            listing_id: None,
            transport,
            unread,
            config,
            state: Arc::new(RwLock::new(ConversationState::new())),
            lifecycle: Arc::new(RwLock::new(LifecycleState::Idle)),
            generation: Arc::new(AtomicU64::new(0)),
            events,
            poll_task: Arc::new(Mutex::new(None)),
        })
    }

    /// Scopes the conversation to a listing; outgoing messages carry the
    /// listing reference.
    pub fn with_listing(mut self, listing_id: impl Into<String>) -> Self {
        self.listing_id = Some(listing_id.into());
        self
    }

    /// Loads history, then transitions Idle → Polling and spawns the
    /// fixed-interval poll loop. A failed history load is recoverable (the
    /// banner flag is set) and does not stop polling from starting.
    pub async fn start(&self) -> Result<()> {
        {
            let mut lifecycle = self.lifecycle.write().await;
            match *lifecycle {
                LifecycleState::Polling => return Ok(()),
                LifecycleState::Stopped => {
                    warn!(peer = %self.peer_id, "start called on a stopped synchronizer");
                    return Ok(());
                }
                LifecycleState::Idle => *lifecycle = LifecycleState::Polling,
            }
        }

        if let Err(e) = self.load_history().await {
            warn!(peer = %self.peer_id, error = %e, "initial history load failed");
        }

        let sync = self.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = interval(sync.config.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately and history just loaded
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if *sync.lifecycle.read().await != LifecycleState::Polling {
                    break;
                }
                if let Err(e) = sync.poll_once().await {
                    warn!(peer = %sync.peer_id, error = %e, "poll cycle failed");
                }
            }
        });
        *self.poll_task.lock().await = Some(handle);

        info!(peer = %self.peer_id, "synchronizer polling");
        Ok(())
    }

    /// Fetches the most recent messages and replaces the conversation state
    /// with them. On failure the previously loaded messages are retained and
    /// the `history_unavailable` banner flag is set.
    pub async fn load_history(&self) -> Result<usize> {
        // Reloading resets the dedup set, so any poll already in flight
        // must not be allowed to land on the new state.
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let fetched = self
            .transport
            .fetch_history(&self.peer_id, self.config.history_limit)
            .await;

        // Same rule as poll_once: compare generations under the write lock
        // so a teardown finishing mid-flight cannot be overwritten.
        let mut state = self.state.write().await;
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!(peer = %self.peer_id, "discarding stale history response");
            return Ok(0);
        }

        match fetched {
            Ok(batch) => {
                let count = batch.len();
                state.replace_from_history(batch);
                drop(state);
                let _ = self.events.send(SyncEvent::HistoryLoaded { count });
                info!(peer = %self.peer_id, count, "history loaded");
                Ok(count)
            }
            Err(e) => {
                state.set_history_unavailable(true);
                Err(ChatError::HistoryUnavailable(e.to_string()))
            }
        }
    }

    /// One incremental fetch: asks the transport for messages strictly newer
    /// than the watermark and admits the unseen ones. Returns the number of
    /// messages admitted. Transport failures propagate so the poll loop can
    /// log them; the next cycle retries with the same watermark.
    pub async fn poll_once(&self) -> Result<usize> {
        let generation = self.generation.load(Ordering::SeqCst);
        let since = self.state.read().await.watermark();

        let batch = self.transport.fetch_since(&self.peer_id, since).await?;
        if batch.is_empty() {
            return Ok(0);
        }

        let mut admitted = 0;
        {
            let mut state = self.state.write().await;
            // Teardown and history reload both bump the generation. The
            // staleness check must run under the write lock: a teardown
            // completing between the fetch and this point would otherwise
            // get its cleared state repopulated below.
            if self.generation.load(Ordering::SeqCst) != generation {
                debug!(peer = %self.peer_id, "discarding stale poll response");
                return Ok(0);
            }
            for msg in batch {
                let from_peer = msg.sender_id != self.self_id;
                let record = msg.clone();
                if state.admit(msg) {
                    admitted += 1;
                    if from_peer {
                        self.unread.increment(&self.peer_id);
                        let _ = self
                            .events
                            .send(SyncEvent::MessageReceived { message: record });
                    }
                }
            }
        }

        if admitted > 0 {
            debug!(peer = %self.peer_id, admitted, "poll admitted new messages");
        }
        Ok(admitted)
    }

    /// Optimistic send: the message appears in the local set immediately,
    /// then is either promoted to the server-confirmed record or marked
    /// failed. On failure the original content travels back in
    /// `ChatError::SendFailed` so the caller can resubmit; there is no
    /// auto-retry.
    pub async fn send_message(&self, content: &str) -> Result<Message> {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(ChatError::EmptyContent);
        }
        if *self.lifecycle.read().await == LifecycleState::Stopped {
            return Err(ChatError::SendFailed {
                content: trimmed.to_string(),
            });
        }

        let temp_id = next_temp_id();
        let optimistic = Message {
            id: temp_id.clone(),
            sender_id: self.self_id.clone(),
            recipient_id: self.peer_id.clone(),
            content: trimmed.to_string(),
            timestamp: Utc::now(),
            listing_id: self.listing_id.clone(),
            status: MessageStatus::Optimistic,
        };
        self.state.write().await.insert_optimistic(optimistic);

        let generation = self.generation.load(Ordering::SeqCst);
        let sent = self.transport.send_message(&self.peer_id, trimmed).await;

        if self.generation.load(Ordering::SeqCst) != generation {
            debug!(peer = %self.peer_id, "discarding stale send completion");
            return match sent {
                Ok(mut confirmed) => {
                    confirmed.status = MessageStatus::Confirmed;
                    Ok(confirmed)
                }
                Err(_) => Err(ChatError::SendFailed {
                    content: trimmed.to_string(),
                }),
            };
        }

        match sent {
            Ok(mut confirmed) => {
                confirmed.status = MessageStatus::Confirmed;
                let reconciled = self
                    .state
                    .write()
                    .await
                    .confirm(&temp_id, confirmed.clone());
                if reconciled.is_none() {
                    // Temp id gone (state was replaced mid-flight); the
                    // confirmed record is still the authoritative answer
                    debug!(peer = %self.peer_id, "optimistic record missing at confirm");
                }
                let _ = self.events.send(SyncEvent::MessageSent {
                    message: confirmed.clone(),
                });
                Ok(confirmed)
            }
            Err(e) => {
                warn!(peer = %self.peer_id, error = %e, "send failed");
                self.state.write().await.mark_failed(&temp_id);
                let _ = self.events.send(SyncEvent::SendFailed { temp_id });
                Err(ChatError::SendFailed {
                    content: trimmed.to_string(),
                })
            }
        }
    }

    /// Stops the poll loop and discards in-memory state. Safe to call more
    /// than once; any in-flight completion observes the generation bump and
    /// leaves the cleared state alone.
    pub async fn teardown(&self) {
        {
            let mut lifecycle = self.lifecycle.write().await;
            if *lifecycle == LifecycleState::Stopped {
                return;
            }
            *lifecycle = LifecycleState::Stopped;
        }
        self.generation.fetch_add(1, Ordering::SeqCst);

        if let Some(handle) = self.poll_task.lock().await.take() {
            handle.abort();
        }
        self.state.write().await.clear();
        info!(peer = %self.peer_id, "synchronizer stopped");
    }

    // ─── Read surface ────────────────────────────────────────────────────

    /// Ordered snapshot of the merged message set.
    pub async fn messages(&self) -> Vec<Message> {
        self.state.read().await.messages().to_vec()
    }

    pub async fn watermark(&self) -> DateTime<Utc> {
        self.state.read().await.watermark()
    }

    /// True while the last history load failed; cleared by a successful one.
    pub async fn history_unavailable(&self) -> bool {
        self.state.read().await.history_unavailable()
    }

    pub async fn lifecycle(&self) -> LifecycleState {
        *self.lifecycle.read().await
    }

    /// Subscribes to sync events for declarative UI updates.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Current unread count for this conversation's peer.
    pub fn unread(&self) -> u64 {
        self.unread.get(&self.peer_id)
    }

    /// Marks the conversation read, clearing the peer's unread badge.
    pub fn mark_read(&self) {
        self.unread.clear(&self.peer_id);
    }

    pub fn self_id(&self) -> &str {
        &self.self_id
    }

    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }
}

//! The Session State Store.
//!
//! Owns the ordered conversation list and serializes all mutation through
//! per-conversation FIFO-fair locks. Callers never touch a `Conversation`
//! in place; they hand [`SessionStore::atomic_update`] a mutator that
//! receives the latest snapshot and returns a full replacement.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{instrument, warn};

use crate::hook::{NullHook, PersistenceHook};
use confab_core::{Conversation, ConversationId};

/// Whether an update should reach the persistence hook.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UpdateMode {
    /// Fire the persistence hook after applying.
    #[default]
    Durable,
    /// Skip the hook (per-delta stream appends).
    Transient,
}

/// Options for one atomic update.
#[derive(Clone, Debug, Default)]
pub struct UpdateOptions {
    /// Label grouping related updates, for tracing only.
    pub batch: Option<String>,
    /// Persistence behavior.
    pub mode: UpdateMode,
}

impl UpdateOptions {
    /// Durable update tagged with `batch`.
    #[must_use]
    pub fn durable(batch: impl Into<String>) -> Self {
        Self {
            batch: Some(batch.into()),
            mode: UpdateMode::Durable,
        }
    }

    /// Transient update tagged with `batch`.
    #[must_use]
    pub fn transient(batch: impl Into<String>) -> Self {
        Self {
            batch: Some(batch.into()),
            mode: UpdateMode::Transient,
        }
    }
}

/// Result of an atomic update.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppliedUpdate {
    /// The mutator ran and its result was stored.
    Applied,
    /// The conversation no longer exists; the mutator was not invoked.
    Skipped,
}

type Slot = Arc<Mutex<Option<Conversation>>>;

/// Ordered conversation store with per-conversation serialized mutation.
///
/// `tokio::sync::Mutex` is FIFO-fair, so updates against the same
/// conversation are applied in the order their calls were issued and never
/// interleaved; updates against different conversations proceed
/// independently. A deleted conversation leaves an empty slot behind, so
/// queued mutators observe the deletion and skip.
pub struct SessionStore {
    slots: DashMap<ConversationId, Slot>,
    order: RwLock<Vec<ConversationId>>,
    hook: Arc<dyn PersistenceHook>,
}

impl SessionStore {
    /// Store that persists through `hook`.
    #[must_use]
    pub fn new(hook: Arc<dyn PersistenceHook>) -> Self {
        Self {
            slots: DashMap::new(),
            order: RwLock::new(Vec::new()),
            hook,
        }
    }

    /// In-memory store with no persistence.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(NullHook))
    }

    /// Insert a conversation at the front of the ordered list.
    #[instrument(skip_all, fields(conversation_id = %conversation.id))]
    pub async fn create(&self, conversation: Conversation) -> ConversationId {
        let id = conversation.id.clone();
        let _ = self
            .slots
            .insert(id.clone(), Arc::new(Mutex::new(Some(conversation))));
        self.order.write().insert(0, id.clone());
        self.run_hook().await;
        id
    }

    /// Seed the store with previously persisted conversations (startup).
    ///
    /// Keeps the given order; does not fire the persistence hook.
    pub fn seed(&self, conversations: Vec<Conversation>) {
        let mut order = self.order.write();
        for conversation in conversations {
            let id = conversation.id.clone();
            let _ = self
                .slots
                .insert(id.clone(), Arc::new(Mutex::new(Some(conversation))));
            order.push(id);
        }
    }

    /// Apply `mutator` to the latest snapshot of `id` and store the result.
    ///
    /// Returns [`AppliedUpdate::Skipped`] without invoking the mutator when
    /// the conversation does not exist (or was deleted while the call was
    /// queued).
    #[instrument(skip_all, fields(conversation_id = %id, batch = options.batch.as_deref()))]
    pub async fn atomic_update<F>(
        &self,
        id: &ConversationId,
        options: UpdateOptions,
        mutator: F,
    ) -> AppliedUpdate
    where
        F: FnOnce(Conversation) -> Conversation + Send,
    {
        let Some(slot) = self.slots.get(id).map(|entry| entry.value().clone()) else {
            return AppliedUpdate::Skipped;
        };

        {
            let mut guard = slot.lock().await;
            let Some(current) = guard.as_ref().cloned() else {
                return AppliedUpdate::Skipped;
            };
            *guard = Some(mutator(current));
        }

        if options.mode == UpdateMode::Durable {
            self.run_hook().await;
        }
        AppliedUpdate::Applied
    }

    /// Latest snapshot of one conversation.
    pub async fn conversation(&self, id: &ConversationId) -> Option<Conversation> {
        let slot = self.slots.get(id).map(|entry| entry.value().clone())?;
        let guard = slot.lock().await;
        guard.clone()
    }

    /// Snapshot of the full conversation list, in order.
    pub async fn list(&self) -> Vec<Conversation> {
        let ids: Vec<ConversationId> = self.order.read().clone();
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(conversation) = self.conversation(&id).await {
                out.push(conversation);
            }
        }
        out
    }

    /// Remove a conversation. Queued updates against it become no-ops.
    #[instrument(skip(self), fields(conversation_id = %id))]
    pub async fn delete(&self, id: &ConversationId) -> bool {
        let Some((_, slot)) = self.slots.remove(id) else {
            return false;
        };
        {
            // Empty the slot so mutators already queued on it observe the
            // deletion instead of resurrecting the conversation.
            let mut guard = slot.lock().await;
            let _ = guard.take();
        }
        self.order.write().retain(|existing| existing != id);
        self.run_hook().await;
        true
    }

    /// Number of conversations.
    pub fn len(&self) -> usize {
        self.order.read().len()
    }

    /// Whether the store holds no conversations.
    pub fn is_empty(&self) -> bool {
        self.order.read().is_empty()
    }

    async fn run_hook(&self) {
        let snapshot = self.list().await;
        if let Err(e) = self.hook.persist(&snapshot).await {
            warn!(error = %e, "persistence hook failed; in-memory state kept");
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

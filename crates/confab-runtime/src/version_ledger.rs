//! Per-message retry locks and version branching.
//!
//! A retry rewrites its target message in place; two concurrent retries on
//! the same message would race that rewrite. The ledger records an
//! in-progress retry per message ID and fails the second one fast. Locks
//! are scoped per message and block nothing else.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::debug;

use crate::errors::SendError;
use confab_core::{ConversationId, Message, MessageId, VersionHistory};

/// Marker for a retry in progress.
#[derive(Clone, Debug)]
struct RetryLock {
    conversation_id: ConversationId,
    started_at: DateTime<Utc>,
}

/// Tracks which messages have a version-mutating operation in flight.
#[derive(Default)]
pub struct VersionLedger {
    locks: DashMap<MessageId, RetryLock>,
}

impl VersionLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a retry of `message`.
    ///
    /// Fails with [`SendError::VersionConflict`] when a retry is already
    /// pending for the message. On success the lock is recorded and the
    /// branched [`VersionHistory`] to write back is returned: the message's
    /// current state becomes version 0 if it had no history, then a blank
    /// version is pushed and activated.
    pub fn begin_retry(
        &self,
        message: &Message,
        conversation_id: &ConversationId,
        started_at: DateTime<Utc>,
    ) -> Result<VersionHistory, SendError> {
        match self.locks.entry(message.id.clone()) {
            Entry::Occupied(existing) => Err(SendError::VersionConflict {
                message_id: message.id.clone(),
                detail: format!(
                    "a retry started at {} is still in progress",
                    existing.get().started_at
                ),
            }),
            Entry::Vacant(slot) => {
                let _ = slot.insert(RetryLock {
                    conversation_id: conversation_id.clone(),
                    started_at,
                });
                debug!(message_id = %message.id, conversation_id = %conversation_id, "retry lock acquired");
                Ok(VersionHistory::branched(message, started_at))
            }
        }
    }

    /// Release the retry lock for `message_id`.
    ///
    /// Idempotent: releasing an already-released lock is a no-op.
    pub fn complete_retry(&self, message_id: &MessageId) {
        if self.locks.remove(message_id).is_some() {
            debug!(message_id = %message_id, "retry lock released");
        }
    }

    /// Whether a retry is currently pending for `message_id`.
    #[must_use]
    pub fn is_retry_pending(&self, message_id: &MessageId) -> bool {
        self.locks.contains_key(message_id)
    }

    /// Conversation owning the pending retry for `message_id`, if any.
    #[must_use]
    pub fn pending_conversation(&self, message_id: &MessageId) -> Option<ConversationId> {
        self.locks
            .get(message_id)
            .map(|lock| lock.conversation_id.clone())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

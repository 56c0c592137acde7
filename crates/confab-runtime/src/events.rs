//! Broadcast-based job event emitter for UI observability.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::broadcast;

use crate::types::JobOutcome;
use confab_core::{ConversationId, JobId};

/// Default broadcast channel capacity.
const DEFAULT_CAPACITY: usize = 1024;

/// Lifecycle notifications for generation jobs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobEvent {
    /// A job was registered; its conversation entered the loading set.
    Started {
        /// The job.
        job_id: JobId,
        /// Its conversation.
        conversation_id: ConversationId,
    },
    /// A job terminated; its conversation left the loading set.
    Finished {
        /// The job.
        job_id: JobId,
        /// Its conversation.
        conversation_id: ConversationId,
        /// How it terminated.
        outcome: JobOutcome,
    },
}

/// Broadcast-based job event emitter.
///
/// Non-blocking: `emit` never awaits. Slow receivers will be dropped
/// (lagged) rather than blocking the sender.
pub struct JobEvents {
    tx: broadcast::Sender<JobEvent>,
    emit_count: AtomicU64,
}

impl JobEvents {
    /// Create a new emitter with the default channel capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a new emitter with a custom channel capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            emit_count: AtomicU64::new(0),
        }
    }

    /// Emit an event to all subscribers. Non-blocking.
    ///
    /// Returns the number of receivers that received the event, 0 when no
    /// subscriber is active.
    pub fn emit(&self, event: JobEvent) -> usize {
        let _ = self.emit_count.fetch_add(1, Ordering::Relaxed);
        self.tx.send(event).unwrap_or(0)
    }

    /// Subscribe to events emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.tx.subscribe()
    }

    /// Number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Total number of events emitted.
    pub fn emit_count(&self) -> u64 {
        self.emit_count.load(Ordering::Relaxed)
    }
}

impl Default for JobEvents {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_with_no_subscribers() {
        let events = JobEvents::new();
        let count = events.emit(JobEvent::Started {
            job_id: JobId::new(),
            conversation_id: ConversationId::new(),
        });
        assert_eq!(count, 0);
        assert_eq!(events.emit_count(), 1);
    }

    #[tokio::test]
    async fn subscribers_receive_in_order() {
        let events = JobEvents::new();
        let mut rx = events.subscribe();

        let job = JobId::new();
        let conv = ConversationId::new();
        let _ = events.emit(JobEvent::Started {
            job_id: job.clone(),
            conversation_id: conv.clone(),
        });
        let _ = events.emit(JobEvent::Finished {
            job_id: job.clone(),
            conversation_id: conv.clone(),
            outcome: JobOutcome::Completed,
        });

        assert_eq!(
            rx.try_recv().unwrap(),
            JobEvent::Started {
                job_id: job.clone(),
                conversation_id: conv.clone(),
            }
        );
        assert!(matches!(
            rx.try_recv().unwrap(),
            JobEvent::Finished {
                outcome: JobOutcome::Completed,
                ..
            }
        ));
    }
}

//! Per-conversation execution exclusivity for generation work.
//!
//! At most one unit of work runs per conversation at any instant; a second
//! job for the same conversation queues FIFO behind the first. Work for
//! different conversations runs fully in parallel.

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::errors::SendError;
use confab_core::{ConversationId, JobId};

/// Per-conversation execution slots.
///
/// Slots are FIFO-fair (`tokio::sync::Mutex`), so queued jobs run in the
/// order they arrived. A queued job whose cancellation token fires before
/// it acquires the slot drops out of the queue without running its work;
/// failure inside the work future releases the slot normally for whatever
/// is queued next.
#[derive(Default)]
pub struct StreamGate {
    slots: DashMap<ConversationId, Arc<Mutex<()>>>,
}

impl StreamGate {
    /// Create a gate with no slots held.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, conversation_id: &ConversationId) -> Arc<Mutex<()>> {
        self.slots
            .entry(conversation_id.clone())
            .or_default()
            .clone()
    }

    /// Run `work` under the conversation's exclusivity slot.
    ///
    /// Returns [`SendError::Cancelled`] without running `work` when `cancel`
    /// fires while the job is still queued.
    pub async fn run<F, T>(
        &self,
        job_id: &JobId,
        conversation_id: &ConversationId,
        cancel: &CancellationToken,
        work: F,
    ) -> Result<T, SendError>
    where
        F: Future<Output = T> + Send,
        T: Send,
    {
        let slot = self.slot(conversation_id);

        // biased: prefer cancellation when both the slot and the token are
        // ready, so a cancelled queued job never starts its work.
        let _guard = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!(job_id = %job_id, conversation_id = %conversation_id, "cancelled while queued");
                return Err(SendError::Cancelled);
            }
            guard = slot.lock() => guard,
        };

        debug!(job_id = %job_id, conversation_id = %conversation_id, "execution slot acquired");
        Ok(work.await)
    }

    /// Drop the slot for a conversation that no longer exists.
    ///
    /// Jobs already queued on the old slot still drain in order; new jobs
    /// get a fresh slot.
    pub fn forget(&self, conversation_id: &ConversationId) {
        let _ = self.slots.remove(conversation_id);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use parking_lot::Mutex as SyncMutex;
    use std::time::{Duration, Instant};

    async fn timed_work(log: Arc<SyncMutex<Vec<(Instant, Instant)>>>, hold: Duration) {
        let start = Instant::now();
        tokio::time::sleep(hold).await;
        log.lock().push((start, Instant::now()));
    }

    #[tokio::test]
    async fn same_conversation_never_overlaps() {
        let gate = Arc::new(StreamGate::new());
        let conv = ConversationId::new();
        let log: Arc<SyncMutex<Vec<(Instant, Instant)>>> = Arc::default();

        let mut handles = Vec::new();
        for _ in 0..3 {
            let gate = gate.clone();
            let conv = conv.clone();
            let log = log.clone();
            handles.push(tokio::spawn(async move {
                let cancel = CancellationToken::new();
                gate.run(&JobId::new(), &conv, &cancel, timed_work(log, Duration::from_millis(30)))
                    .await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }

        let windows = log.lock().clone();
        assert_eq!(windows.len(), 3);
        let mut sorted = windows.clone();
        sorted.sort_by_key(|w| w.0);
        for pair in sorted.windows(2) {
            assert!(
                pair[0].1 <= pair[1].0,
                "execution windows must not overlap: {pair:?}"
            );
        }
    }

    #[tokio::test]
    async fn different_conversations_run_in_parallel() {
        let gate = Arc::new(StreamGate::new());
        let log: Arc<SyncMutex<Vec<(Instant, Instant)>>> = Arc::default();

        let mut handles = Vec::new();
        for _ in 0..2 {
            let gate = gate.clone();
            let conv = ConversationId::new();
            let log = log.clone();
            handles.push(tokio::spawn(async move {
                let cancel = CancellationToken::new();
                gate.run(&JobId::new(), &conv, &cancel, timed_work(log, Duration::from_millis(80)))
                    .await
            }));
        }
        let started = Instant::now();
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }

        // Two 80ms jobs overlapping take well under 160ms.
        assert!(
            started.elapsed() < Duration::from_millis(150),
            "independent conversations should not serialize"
        );
    }

    #[tokio::test]
    async fn cancelled_queued_job_never_runs() {
        let gate = Arc::new(StreamGate::new());
        let conv = ConversationId::new();

        // First job holds the slot.
        let first = {
            let gate = gate.clone();
            let conv = conv.clone();
            tokio::spawn(async move {
                let cancel = CancellationToken::new();
                gate.run(&JobId::new(), &conv, &cancel, async {
                    tokio::time::sleep(Duration::from_millis(60)).await;
                })
                .await
            })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;

        // Second job queues, then is cancelled before the slot frees.
        let ran = Arc::new(SyncMutex::new(false));
        let cancel = CancellationToken::new();
        let second = {
            let gate = gate.clone();
            let conv = conv.clone();
            let ran = ran.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                gate.run(&JobId::new(), &conv, &cancel, async {
                    *ran.lock() = true;
                })
                .await
            })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        cancel.cancel();

        let second_result = second.await.unwrap();
        assert_matches!(second_result, Err(SendError::Cancelled));
        assert!(!*ran.lock(), "cancelled queued work must not run");

        assert!(first.await.unwrap().is_ok());

        // The slot is free again for subsequent jobs.
        let cancel = CancellationToken::new();
        let result = gate
            .run(&JobId::new(), &conv, &cancel, async { 7 })
            .await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn failure_inside_work_releases_slot() {
        let gate = StreamGate::new();
        let conv = ConversationId::new();
        let cancel = CancellationToken::new();

        let failed: Result<Result<(), SendError>, SendError> = gate
            .run(&JobId::new(), &conv, &cancel, async {
                Err(SendError::Internal("work blew up".into()))
            })
            .await;
        assert!(matches!(failed, Ok(Err(SendError::Internal(_)))));

        // Queue is not blocked by the failure.
        let ok = gate.run(&JobId::new(), &conv, &cancel, async { 1 }).await;
        assert_eq!(ok.unwrap(), 1);
    }

    #[tokio::test]
    async fn queued_jobs_run_fifo() {
        let gate = Arc::new(StreamGate::new());
        let conv = ConversationId::new();
        let order: Arc<SyncMutex<Vec<usize>>> = Arc::default();

        let mut handles = Vec::new();
        for i in 0..4 {
            let gate = gate.clone();
            let conv = conv.clone();
            let order = order.clone();
            handles.push(tokio::spawn(async move {
                let cancel = CancellationToken::new();
                gate.run(&JobId::new(), &conv, &cancel, async move {
                    order.lock().push(i);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                })
                .await
            }));
            // Stagger arrivals so queue order is deterministic.
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }

        assert_eq!(*order.lock(), vec![0, 1, 2, 3]);
    }
}

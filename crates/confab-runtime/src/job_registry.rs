//! Active generation job tracking.
//!
//! The registry is the single owner of job records; callers never touch the
//! job table directly. All mutation funnels through `start_job` /
//! `complete_job`, and every terminal outcome passes through exactly one
//! `complete_job` call, so the loading indicator and the gate slot are
//! always released exactly once.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::events::{JobEvent, JobEvents};
use crate::types::{JobOutcome, JobStatus};
use confab_core::{ConversationId, JobId, MessageId};

/// One tracked generation job.
#[derive(Clone, Debug)]
pub struct JobRecord {
    /// Unique job ID.
    pub id: JobId,
    /// Owning conversation.
    pub conversation_id: ConversationId,
    /// The model message this job writes into.
    pub target_message: MessageId,
    /// Cooperative cancellation token.
    pub cancel: CancellationToken,
    /// Current lifecycle state.
    pub status: JobStatus,
    /// When the job was accepted.
    pub started_at: DateTime<Utc>,
}

impl JobRecord {
    /// New pending job for `conversation_id` targeting `target_message`.
    #[must_use]
    pub fn new(conversation_id: ConversationId, target_message: MessageId) -> Self {
        Self {
            id: JobId::new(),
            conversation_id,
            target_message,
            cancel: CancellationToken::new(),
            status: JobStatus::Pending,
            started_at: Utc::now(),
        }
    }
}

/// Registry of in-flight generation jobs.
pub struct JobRegistry {
    jobs: DashMap<JobId, JobRecord>,
    events: JobEvents,
}

impl JobRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            jobs: DashMap::new(),
            events: JobEvents::new(),
        }
    }

    /// Register a job; its conversation enters the loading set.
    #[instrument(skip_all, fields(job_id = %record.id, conversation_id = %record.conversation_id))]
    pub fn start_job(&self, record: JobRecord) -> JobId {
        let job_id = record.id.clone();
        let conversation_id = record.conversation_id.clone();
        let _ = self.jobs.insert(job_id.clone(), record);
        let _ = self.events.emit(JobEvent::Started {
            job_id: job_id.clone(),
            conversation_id,
        });
        debug!("job registered");
        job_id
    }

    /// Mark a job active (it acquired its conversation's execution slot).
    pub fn mark_active(&self, job_id: &JobId) {
        if let Some(mut record) = self.jobs.get_mut(job_id) {
            record.status = JobStatus::Active;
        }
    }

    /// Remove a job with its terminal outcome.
    ///
    /// Idempotent: completing an already-completed or unknown job ID is a
    /// no-op that returns `false`.
    #[instrument(skip(self), fields(job_id = %job_id, outcome = ?outcome))]
    pub fn complete_job(&self, job_id: &JobId, outcome: JobOutcome) -> bool {
        let Some((_, record)) = self.jobs.remove(job_id) else {
            debug!("complete_job on unknown job id; ignoring");
            return false;
        };
        let _ = self.events.emit(JobEvent::Finished {
            job_id: job_id.clone(),
            conversation_id: record.conversation_id,
            outcome,
        });
        debug!("job completed");
        true
    }

    /// Trigger a job's cancellation token.
    ///
    /// Safe to call for unknown or already-completed jobs.
    pub fn cancel_job(&self, job_id: &JobId) {
        if let Some(record) = self.jobs.get(job_id) {
            record.cancel.cancel();
        } else {
            warn!(job_id = %job_id, "cancel requested for unknown job");
        }
    }

    /// Cancel every job owned by `conversation_id`.
    pub fn cancel_conversation(&self, conversation_id: &ConversationId) {
        for record in self.jobs.iter() {
            if &record.conversation_id == conversation_id {
                record.cancel.cancel();
            }
        }
    }

    /// Whether any job is registered for `conversation_id`.
    #[must_use]
    pub fn is_loading(&self, conversation_id: &ConversationId) -> bool {
        self.jobs
            .iter()
            .any(|record| &record.conversation_id == conversation_id)
    }

    /// Conversation IDs with a registered job, for observability.
    #[must_use]
    pub fn loading_conversations(&self) -> HashSet<ConversationId> {
        self.jobs
            .iter()
            .map(|record| record.conversation_id.clone())
            .collect()
    }

    /// Current status of `job_id`, if registered.
    #[must_use]
    pub fn job_status(&self, job_id: &JobId) -> Option<JobStatus> {
        self.jobs.get(job_id).map(|record| record.status)
    }

    /// Number of registered jobs.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.jobs.len()
    }

    /// Subscribe to job lifecycle events.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

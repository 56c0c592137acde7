//! Message types for the confab conversation model.
//!
//! A [`Message`] is one turn in a conversation. Three roles: user, model,
//! and error (synthesized for terminal validation failures). Model messages
//! carry transient loading state while a generation job targets them, and an
//! optional [`VersionHistory`] that grows by exactly one snapshot per retry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::MessageId;

// ─────────────────────────────────────────────────────────────────────────────
// Roles and attachments
// ─────────────────────────────────────────────────────────────────────────────

/// Who produced a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The human participant.
    User,
    /// The model-serving backend.
    Model,
    /// A synthesized error notice (validation failures, etc.).
    Error,
}

/// Upload/processing state of an attached file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentState {
    /// Still being processed by the upload pipeline.
    Processing,
    /// Ready to be sent.
    Ready,
    /// Processing failed.
    Failed,
}

/// Reference to a file attached to a message.
///
/// File-upload processing itself is an external collaborator; the
/// orchestrator only inspects `state` and `accepted` during validation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentRef {
    /// Opaque attachment identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// MIME type (e.g. `image/png`).
    pub mime_type: String,
    /// Storage URI or handle.
    pub uri: String,
    /// Size in bytes, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    /// Processing state.
    pub state: AttachmentState,
    /// Whether the user explicitly accepted a failed attachment.
    #[serde(default)]
    pub accepted: bool,
}

impl AttachmentRef {
    /// Whether this attachment blocks sending.
    ///
    /// Attachments still processing always block; failed attachments block
    /// unless the user explicitly accepted them.
    #[must_use]
    pub fn blocks_send(&self) -> bool {
        match self.state {
            AttachmentState::Processing => true,
            AttachmentState::Failed => !self.accepted,
            AttachmentState::Ready => false,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Token usage
// ─────────────────────────────────────────────────────────────────────────────

/// Token counters reported by the generation backend.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    /// Tokens in the prompt.
    pub prompt_tokens: u32,
    /// Tokens in the completion.
    pub completion_tokens: u32,
    /// Prompt + completion for this generation.
    pub total_tokens: u32,
    /// Running total across the conversation.
    pub cumulative_total: u32,
}

impl TokenUsage {
    /// Fold another usage report into this one (saturating).
    pub fn merge(&mut self, other: &Self) {
        self.prompt_tokens = self.prompt_tokens.saturating_add(other.prompt_tokens);
        self.completion_tokens = self.completion_tokens.saturating_add(other.completion_tokens);
        self.total_tokens = self.total_tokens.saturating_add(other.total_tokens);
        self.cumulative_total = self.cumulative_total.max(other.cumulative_total);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Version history
// ─────────────────────────────────────────────────────────────────────────────

/// Snapshot of one rendering of a model message, retained across retries.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageVersion {
    /// Message content at snapshot time.
    pub content: String,
    /// Thought output at snapshot time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
    /// Attachments at snapshot time.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<AttachmentRef>,
    /// Generation start time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// Generation end time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Time spent emitting thoughts before the first content part.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking_duration_ms: Option<u64>,
    /// Token counters for this rendering.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,
}

/// Ordered prior renderings of a model message plus the displayed index.
///
/// Invariants: if non-empty, index 0 is the message's original (pre-retry)
/// snapshot; each retry appends exactly one snapshot and advances
/// `active_index` to it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionHistory {
    /// Stored snapshots, oldest first.
    pub versions: Vec<MessageVersion>,
    /// Index of the currently displayed snapshot.
    pub active_index: usize,
}

impl VersionHistory {
    /// Number of stored snapshots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.versions.len()
    }

    /// Whether the history holds no snapshots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// The currently displayed snapshot, if any.
    #[must_use]
    pub fn active(&self) -> Option<&MessageVersion> {
        self.versions.get(self.active_index)
    }

    /// Build the history a retry of `message` should write back.
    ///
    /// If the message has no prior versions, its current state becomes
    /// version 0 before the new blank version is pushed; `active_index`
    /// always lands on the new version.
    #[must_use]
    pub fn branched(message: &Message, started_at: DateTime<Utc>) -> Self {
        let mut versions = message
            .versions
            .as_ref()
            .map(|h| h.versions.clone())
            .unwrap_or_default();
        if versions.is_empty() {
            versions.push(message.snapshot_version());
        }
        versions.push(MessageVersion {
            started_at: Some(started_at),
            ..MessageVersion::default()
        });
        let active_index = versions.len() - 1;
        Self {
            versions,
            active_index,
        }
    }

    /// Overwrite the active snapshot with `snapshot`.
    ///
    /// No-op when `active_index` is out of bounds.
    pub fn sync_active(&mut self, snapshot: MessageVersion) {
        if let Some(slot) = self.versions.get_mut(self.active_index) {
            *slot = snapshot;
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Message
// ─────────────────────────────────────────────────────────────────────────────

/// One turn in a conversation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Unique message ID.
    pub id: MessageId,
    /// Who produced the message.
    pub role: Role,
    /// Textual content (possibly partial while a job is streaming into it).
    pub content: String,
    /// Thought output streamed alongside content.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
    /// Attached file references.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<AttachmentRef>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// True while an active job targets this message.
    #[serde(default)]
    pub is_loading: bool,
    /// Generation start time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// Generation end time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Time spent emitting thoughts before the first content part.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking_duration_ms: Option<u64>,
    /// Token counters for the displayed rendering.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,
    /// Grounding metadata reported by the backend (opaque to this crate).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grounding: Option<serde_json::Value>,
    /// Failure recorded mid-flight, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Prior renderings retained across retries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub versions: Option<VersionHistory>,
}

impl Message {
    fn base(role: Role, content: String) -> Self {
        Self {
            id: MessageId::new(),
            role,
            content,
            thinking: None,
            attachments: Vec::new(),
            created_at: Utc::now(),
            is_loading: false,
            started_at: None,
            completed_at: None,
            thinking_duration_ms: None,
            token_usage: None,
            grounding: None,
            error: None,
            versions: None,
        }
    }

    /// Create a user message.
    #[must_use]
    pub fn user(content: impl Into<String>, attachments: Vec<AttachmentRef>) -> Self {
        let mut msg = Self::base(Role::User, content.into());
        msg.attachments = attachments;
        msg
    }

    /// Create an empty model message awaiting generation output.
    #[must_use]
    pub fn placeholder(started_at: DateTime<Utc>) -> Self {
        let mut msg = Self::base(Role::Model, String::new());
        msg.is_loading = true;
        msg.started_at = Some(started_at);
        msg
    }

    /// Create a synthesized error-role message.
    #[must_use]
    pub fn error_notice(detail: impl Into<String>) -> Self {
        Self::base(Role::Error, detail.into())
    }

    /// Snapshot the message's current rendering as a [`MessageVersion`].
    #[must_use]
    pub fn snapshot_version(&self) -> MessageVersion {
        MessageVersion {
            content: self.content.clone(),
            thinking: self.thinking.clone(),
            attachments: self.attachments.clone(),
            started_at: self.started_at,
            completed_at: self.completed_at,
            thinking_duration_ms: self.thinking_duration_ms,
            token_usage: self.token_usage,
        }
    }

    /// Rewrite this message in place at the start of a retry.
    ///
    /// Installs the branched history, clears transient generation fields,
    /// and marks the message loading again.
    pub fn reset_for_retry(&mut self, versions: VersionHistory, started_at: DateTime<Utc>) {
        self.versions = Some(versions);
        self.content.clear();
        self.thinking = None;
        self.error = None;
        self.token_usage = None;
        self.grounding = None;
        self.thinking_duration_ms = None;
        self.completed_at = None;
        self.started_at = Some(started_at);
        self.is_loading = true;
    }

    /// Record a mid-flight failure and stop loading.
    pub fn record_failure(&mut self, detail: impl Into<String>, at: DateTime<Utc>) {
        self.error = Some(detail.into());
        self.is_loading = false;
        self.completed_at = Some(at);
    }

    /// Mirror the current rendering into the active version slot, if this
    /// message carries a history.
    pub fn sync_active_version(&mut self) {
        let snapshot = self.snapshot_version();
        if let Some(history) = self.versions.as_mut() {
            history.sync_active(snapshot);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

//! Request and job lifecycle types.

use serde::{Deserialize, Serialize};

use confab_core::{AttachmentRef, ConversationId, JobId, MessageId};

/// Lifecycle state of a generation job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Accepted; waiting for the conversation's execution slot.
    Pending,
    /// Holding the slot; the external call is in flight.
    Active,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Error,
    /// Cancelled before or during execution.
    Cancelled,
}

/// How a job terminated. Every job terminates exactly once.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobOutcome {
    /// The generation completed.
    Completed,
    /// The generation failed.
    Error,
    /// The generation was cancelled.
    Cancelled,
}

impl JobOutcome {
    /// Terminal status corresponding to this outcome.
    #[must_use]
    pub fn status(self) -> JobStatus {
        match self {
            Self::Completed => JobStatus::Completed,
            Self::Error => JobStatus::Error,
            Self::Cancelled => JobStatus::Cancelled,
        }
    }
}

/// What a send request asks for.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SendAction {
    /// Append a new turn (to the named conversation, or a new one).
    Send,
    /// Replace the message at the given ID and discard everything after it.
    Edit {
        /// The user message being edited.
        message_id: MessageId,
    },
    /// Regenerate the given model message, branching its version history.
    Retry {
        /// The model message being retried.
        message_id: MessageId,
    },
}

/// One send/edit/retry request.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    /// Target conversation; `None` creates a new one (plain sends only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation: Option<ConversationId>,
    /// Message text.
    pub text: String,
    /// Attached files.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<AttachmentRef>,
    /// Requested action.
    pub action: SendAction,
}

impl SendRequest {
    /// Plain send into a new conversation.
    #[must_use]
    pub fn new_conversation(text: impl Into<String>) -> Self {
        Self {
            conversation: None,
            text: text.into(),
            attachments: Vec::new(),
            action: SendAction::Send,
        }
    }

    /// Plain send into an existing conversation.
    #[must_use]
    pub fn to_conversation(conversation: ConversationId, text: impl Into<String>) -> Self {
        Self {
            conversation: Some(conversation),
            text: text.into(),
            attachments: Vec::new(),
            action: SendAction::Send,
        }
    }

    /// Edit `message_id`, truncating everything after it.
    #[must_use]
    pub fn edit(
        conversation: ConversationId,
        message_id: MessageId,
        text: impl Into<String>,
    ) -> Self {
        Self {
            conversation: Some(conversation),
            text: text.into(),
            attachments: Vec::new(),
            action: SendAction::Edit { message_id },
        }
    }

    /// Retry the model message `message_id`.
    #[must_use]
    pub fn retry(conversation: ConversationId, message_id: MessageId) -> Self {
        Self {
            conversation: Some(conversation),
            text: String::new(),
            attachments: Vec::new(),
            action: SendAction::Retry { message_id },
        }
    }

    /// Attach files to the request.
    #[must_use]
    pub fn with_attachments(mut self, attachments: Vec<AttachmentRef>) -> Self {
        self.attachments = attachments;
        self
    }
}

/// Identifies where an accepted request landed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendReceipt {
    /// The job that ran.
    pub job_id: JobId,
    /// The conversation the turn landed in.
    pub conversation_id: ConversationId,
    /// The model message the output was written to.
    pub message_id: MessageId,
}

//! Runtime error types.

use confab_core::{ConversationId, MessageId};
use confab_llm::ServiceError;

/// Request rejections detected before any job is created.
///
/// Each variant's message is user-visible: it becomes the content of the
/// synthesized error-role message.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    /// Empty prompt without usable attachments on a text-capable model.
    #[error("Message text is empty and no usable attachments are present")]
    EmptyPrompt,

    /// An attachment has not finished processing.
    #[error("Attachment \"{name}\" is still processing")]
    AttachmentProcessing {
        /// Attachment display name.
        name: String,
    },

    /// An attachment failed and was not explicitly accepted.
    #[error("Attachment \"{name}\" failed to process")]
    AttachmentFailed {
        /// Attachment display name.
        name: String,
    },

    /// Neither the conversation nor the app settings name a model.
    #[error("No model selected")]
    NoModelSelected,

    /// No usable credential could be resolved.
    #[error("No usable API credential: {detail}")]
    NoCredential {
        /// Resolver failure description.
        detail: String,
    },
}

/// Errors that can occur while handling a send/edit/retry request.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// Terminal validation failure; surfaced as a synthesized message.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// A retry is already pending for the target message.
    #[error("retry conflict on message {message_id}: {detail}")]
    VersionConflict {
        /// The contested message.
        message_id: MessageId,
        /// Conflict description.
        detail: String,
    },

    /// The target conversation does not exist.
    #[error("conversation not found: {0}")]
    ConversationNotFound(ConversationId),

    /// Generation service failure (recorded onto the target message).
    #[error("service error: {0}")]
    Service(#[from] ServiceError),

    /// The job was cancelled.
    #[error("generation cancelled")]
    Cancelled,

    /// Internal / unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SendError {
    /// Error category string for event emission.
    #[must_use]
    pub fn category(&self) -> &str {
        match self {
            Self::Validation(_) => "validation",
            Self::VersionConflict { .. } => "version_conflict",
            Self::ConversationNotFound(_) => "not_found",
            Self::Service(_) => "service",
            Self::Cancelled => "cancelled",
            Self::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_messages_are_user_visible() {
        let err = ValidationError::AttachmentProcessing {
            name: "scan.pdf".into(),
        };
        assert_eq!(err.to_string(), "Attachment \"scan.pdf\" is still processing");

        let err = ValidationError::NoCredential {
            detail: "no API key configured".into(),
        };
        assert_eq!(
            err.to_string(),
            "No usable API credential: no API key configured"
        );
    }

    #[test]
    fn send_error_category() {
        assert_eq!(
            SendError::Validation(ValidationError::EmptyPrompt).category(),
            "validation"
        );
        assert_eq!(SendError::Cancelled.category(), "cancelled");
        assert_eq!(
            SendError::VersionConflict {
                message_id: MessageId::from("m1"),
                detail: "busy".into()
            }
            .category(),
            "version_conflict"
        );
        assert_eq!(
            SendError::ConversationNotFound(ConversationId::from("c1")).category(),
            "not_found"
        );
        assert_eq!(SendError::Internal("x".into()).category(), "internal");
    }

    #[test]
    fn service_error_converts() {
        let err: SendError = ServiceError::Cancelled.into();
        assert_eq!(err.category(), "service");
    }
}

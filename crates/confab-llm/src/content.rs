//! Content parts and the content-builder collaborator.
//!
//! The content builder is a pure transform from user text + attachments to
//! backend content parts; the orchestrator assumes nothing about it beyond
//! the return value.

use confab_core::AttachmentRef;
use serde::{Deserialize, Serialize};

/// One part of the content sent to the backend.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Plain text.
    Text {
        /// The text.
        text: String,
    },
    /// A file reference resolved by the upload pipeline.
    Blob {
        /// MIME type.
        #[serde(rename = "mimeType")]
        mime_type: String,
        /// Storage URI or handle.
        uri: String,
    },
}

/// Result of building content for a request.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BuiltContent {
    /// Parts to send to the backend.
    pub parts: Vec<ContentPart>,
    /// Attachments enriched by the build step (echoed into the user message).
    pub enriched_files: Vec<AttachmentRef>,
}

/// Pure transform from user input to backend content parts.
pub trait ContentBuilder: Send + Sync {
    /// Build content parts from `text` and `files`.
    fn build(&self, text: &str, files: &[AttachmentRef]) -> BuiltContent;
}

/// Minimal builder: one text part plus one blob part per attachment.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlainTextBuilder;

impl ContentBuilder for PlainTextBuilder {
    fn build(&self, text: &str, files: &[AttachmentRef]) -> BuiltContent {
        let mut parts = Vec::with_capacity(1 + files.len());
        if !text.is_empty() {
            parts.push(ContentPart::Text {
                text: text.to_owned(),
            });
        }
        for file in files {
            parts.push(ContentPart::Blob {
                mime_type: file.mime_type.clone(),
                uri: file.uri.clone(),
            });
        }
        BuiltContent {
            parts,
            enriched_files: files.to_vec(),
        }
    }
}

//! Model capability registry.
//!
//! Dispatching a send request depends on the selected model's declared
//! capability: standard conversational models stream, media-generation
//! models are single-shot, and image-editing models consume prior
//! conversation messages as context.

use serde::{Deserialize, Serialize};

/// Declared capability of a model, selecting its generation path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// Standard conversational model (supports streaming).
    Chat,
    /// Image generation (single-shot, no streaming).
    ImageGeneration,
    /// Audio/speech generation (single-shot, no streaming).
    AudioGeneration,
    /// Image editing over prior conversation images (single-shot).
    ImageEditing,
}

impl ModelKind {
    /// Whether this kind accepts free-form text prompts.
    ///
    /// Text-capable kinds reject empty prompts unless valid attachments are
    /// present; image editing operates on prior images and tolerates an
    /// empty instruction.
    #[must_use]
    pub fn is_text_capable(self) -> bool {
        !matches!(self, Self::ImageEditing)
    }

    /// Whether this kind exercises the streaming branch.
    #[must_use]
    pub fn supports_streaming(self) -> bool {
        matches!(self, Self::Chat)
    }
}

/// Known model-id prefixes mapped to capabilities, checked in order.
const KIND_PREFIXES: &[(&str, ModelKind)] = &[
    ("image-edit", ModelKind::ImageEditing),
    ("image", ModelKind::ImageGeneration),
    ("audio", ModelKind::AudioGeneration),
    ("tts", ModelKind::AudioGeneration),
];

/// Capability of `model_id`.
///
/// Unknown IDs resolve to [`ModelKind::Chat`]; the conversational path is
/// the default for anything the registry has not special-cased.
#[must_use]
pub fn kind_for(model_id: &str) -> ModelKind {
    for (prefix, kind) in KIND_PREFIXES {
        if model_id.starts_with(prefix) {
            return *kind;
        }
    }
    ModelKind::Chat
}

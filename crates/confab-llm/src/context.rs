//! Request-scoped conversational context sent to the backend.

use confab_core::{AttachmentRef, Role};
use serde::{Deserialize, Serialize};

/// One prior turn included in a generation request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptTurn {
    /// Who produced the turn.
    pub role: Role,
    /// Turn text.
    pub text: String,
    /// Files attached to the turn.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<AttachmentRef>,
}

/// Ordered conversational history for one generation request.
///
/// A context is scoped to a single request: retries and edits build a fresh
/// one from the truncated history instead of reusing a standing object, so
/// unrelated turns never leak across branches.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptContext {
    /// Prior turns, oldest first.
    pub turns: Vec<PromptTurn>,
}

impl PromptContext {
    /// Context with no prior turns.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of turns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether the context holds no turns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Append a turn.
    pub fn push(&mut self, turn: PromptTurn) {
        self.turns.push(turn);
    }
}

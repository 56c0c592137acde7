//! Streaming increment events delivered by a generation backend.
//!
//! Callback-style delivery is modelled as an ordered stream of
//! [`StreamEvent`]s consumed by exactly one subscriber (the orchestrator),
//! decoupling the backend's delivery mechanism from how increments are
//! folded into conversation state.

use confab_core::TokenUsage;
use serde::{Deserialize, Serialize};

/// One increment from a streaming generation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Incremental content text.
    Part {
        /// Text fragment.
        text: String,
    },

    /// Incremental thought text.
    Thought {
        /// Thought fragment.
        text: String,
    },

    /// Terminal event: usage counters and grounding metadata.
    Done {
        /// Token counters for the generation.
        #[serde(skip_serializing_if = "Option::is_none")]
        usage: Option<TokenUsage>,
        /// Backend-specific grounding metadata (opaque).
        #[serde(skip_serializing_if = "Option::is_none")]
        grounding: Option<serde_json::Value>,
    },
}

/// Full result of a non-streaming generation.
///
/// Shaped like the streaming path (all parts, then thoughts, then usage) so
/// both paths fold into state identically.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationOutcome {
    /// Content parts in delivery order.
    pub parts: Vec<String>,
    /// Thought parts in delivery order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub thoughts: Vec<String>,
    /// Token counters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    /// Backend-specific grounding metadata (opaque).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grounding: Option<serde_json::Value>,
}

impl GenerationOutcome {
    /// Concatenated content text.
    #[must_use]
    pub fn content(&self) -> String {
        self.parts.concat()
    }
}

//! Conversation records: an ordered, mutable message list plus settings.
//!
//! Message order is never reordered — only appended to, truncated (edit),
//! or mutated at a fixed index (streaming updates, retries).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ConversationId, MessageId};
use crate::messages::Message;

/// Title assigned to a conversation until the title generator runs.
pub const PLACEHOLDER_TITLE: &str = "New conversation";

/// Per-conversation generation settings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSettings {
    /// Model identifier; falls back to the app default when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Top-p sampling.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    /// Whether thought streaming is requested.
    #[serde(default)]
    pub thinking_enabled: bool,
    /// Credential locked to this conversation, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pinned_credential: Option<String>,
}

/// An ordered, persisted list of messages plus its settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    /// Unique conversation ID.
    pub id: ConversationId,
    /// Display title.
    pub title: String,
    /// Ordered message list.
    pub messages: Vec<Message>,
    /// Generation settings.
    #[serde(default)]
    pub settings: ConversationSettings,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Create an empty conversation with the placeholder title.
    #[must_use]
    pub fn new(settings: ConversationSettings) -> Self {
        Self {
            id: ConversationId::new(),
            title: PLACEHOLDER_TITLE.to_owned(),
            messages: Vec::new(),
            settings,
            updated_at: Utc::now(),
        }
    }

    /// Whether the title generator has not yet replaced the placeholder.
    #[must_use]
    pub fn has_placeholder_title(&self) -> bool {
        self.title == PLACEHOLDER_TITLE
    }

    /// Append a message and bump `updated_at`.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
        self.touch();
    }

    /// Index of the message with `id`, if present.
    #[must_use]
    pub fn message_index(&self, id: &MessageId) -> Option<usize> {
        self.messages.iter().position(|m| &m.id == id)
    }

    /// Immutable lookup by message ID.
    #[must_use]
    pub fn message(&self, id: &MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| &m.id == id)
    }

    /// Mutable lookup by message ID.
    pub fn message_mut(&mut self, id: &MessageId) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| &m.id == id)
    }

    /// Bump the last-modified timestamp.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_conversation_has_placeholder_title() {
        let conv = Conversation::new(ConversationSettings::default());
        assert!(conv.has_placeholder_title());
        assert!(conv.messages.is_empty());
    }

    #[test]
    fn push_bumps_updated_at() {
        let mut conv = Conversation::new(ConversationSettings::default());
        let before = conv.updated_at;
        std::thread::sleep(std::time::Duration::from_millis(2));
        conv.push(Message::user("hi", vec![]));
        assert!(conv.updated_at > before);
        assert_eq!(conv.messages.len(), 1);
    }

    #[test]
    fn message_lookup_by_id() {
        let mut conv = Conversation::new(ConversationSettings::default());
        let msg = Message::user("hi", vec![]);
        let id = msg.id.clone();
        conv.push(msg);
        assert_eq!(conv.message_index(&id), Some(0));
        assert_eq!(conv.message(&id).unwrap().content, "hi");
        assert!(conv.message(&crate::ids::MessageId::new()).is_none());
    }

    #[test]
    fn settings_serde_roundtrip() {
        let settings = ConversationSettings {
            model: Some("chat-standard".into()),
            temperature: Some(0.8),
            top_p: None,
            thinking_enabled: true,
            pinned_credential: Some("key-1".into()),
        };
        let json = serde_json::to_string(&settings).unwrap();
        let back: ConversationSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(back, settings);
    }
}

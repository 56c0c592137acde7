//! Title generation seam.
//!
//! Called only while a conversation still carries its placeholder title;
//! the heuristics themselves are an external concern.

use async_trait::async_trait;

use crate::provider::ServiceResult;
use confab_core::{Message, Role};

/// Maximum title length before truncation.
const MAX_TITLE_LEN: usize = 100;

/// Produces a display title from the opening messages of a conversation.
#[async_trait]
pub trait TitleGenerator: Send + Sync {
    /// Generate a title for `messages`.
    async fn generate(&self, messages: &[Message]) -> ServiceResult<String>;
}

/// Strip quotes and extra lines, clamp length, and fall back on a default.
fn clean_title(raw: &str) -> String {
    let cleaned = raw
        .trim()
        .trim_matches('"')
        .trim_matches('\'')
        .lines()
        .next()
        .unwrap_or("")
        .trim()
        .to_owned();

    if cleaned.is_empty() {
        "New conversation".to_owned()
    } else if cleaned.chars().count() > MAX_TITLE_LEN {
        let clipped: String = cleaned.chars().take(MAX_TITLE_LEN - 3).collect();
        format!("{clipped}...")
    } else {
        cleaned
    }
}

/// Title generator that uses the first user message's opening line.
///
/// Cheap local fallback; a backend-driven generator implements the same
/// trait.
#[derive(Clone, Copy, Debug, Default)]
pub struct FirstLineTitleGenerator;

#[async_trait]
impl TitleGenerator for FirstLineTitleGenerator {
    async fn generate(&self, messages: &[Message]) -> ServiceResult<String> {
        let first_user = messages
            .iter()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        Ok(clean_title(first_user))
    }
}

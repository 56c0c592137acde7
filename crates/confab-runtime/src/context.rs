//! Request-scoped prompt context construction.
//!
//! Each generation request gets its own [`PromptContext`] built from the
//! conversation snapshot at seed time. Edits and retries pass a cutoff so
//! discarded or regenerated turns never leak into the request.

use confab_llm::{PromptContext, PromptTurn};
use confab_core::{Conversation, Role};

/// Build the context from `conversation`, including turns before `up_to`
/// (exclusive). `None` includes the whole history.
///
/// Error-role notices and messages still loading (placeholders with no
/// content yet) are not part of the conversational record sent upstream.
#[must_use]
pub fn build_context(conversation: &Conversation, up_to: Option<usize>) -> PromptContext {
    let cutoff = up_to.unwrap_or(conversation.messages.len());
    let mut context = PromptContext::empty();

    for message in conversation.messages.iter().take(cutoff) {
        if message.role == Role::Error || message.is_loading {
            continue;
        }
        if message.role == Role::Model && message.content.is_empty() {
            continue;
        }
        context.push(PromptTurn {
            role: message.role,
            text: message.content.clone(),
            attachments: message.attachments.clone(),
        });
    }

    context
}

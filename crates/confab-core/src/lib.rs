//! # confab-core
//!
//! Foundation types for the confab generation-orchestration system.
//!
//! This crate provides the shared vocabulary the other confab crates depend on:
//!
//! - **Branded IDs**: `ConversationId`, `MessageId`, `JobId` as newtypes for type safety
//! - **Messages**: `Message` with roles, attachments, token usage, and version history
//! - **Conversations**: ordered message lists plus per-conversation settings
//! - **Settings**: request-time configuration resolved once and passed down
//! - **Logging**: `tracing` subscriber initialization

#![deny(unsafe_code)]

pub mod conversation;
pub mod ids;
pub mod logging;
pub mod messages;
pub mod settings;

pub use conversation::{Conversation, ConversationSettings, PLACEHOLDER_TITLE};
pub use ids::{ConversationId, JobId, MessageId};
pub use messages::{
    AttachmentRef, AttachmentState, Message, MessageVersion, Role, TokenUsage, VersionHistory,
};
pub use settings::{AppSettings, RequestConfig};

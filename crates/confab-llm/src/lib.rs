//! # confab-llm
//!
//! External collaborator seams for the generation orchestrator.
//!
//! Defines the [`GenerationService`](provider::GenerationService) trait that
//! model-serving backends implement, the [`StreamEvent`](events::StreamEvent)
//! increment stream consumed by the runtime, and the narrow traits the
//! orchestrator consumes but does not implement: content building, credential
//! resolution, and title generation. Also ships a scripted mock service for
//! deterministic tests without a backend.

#![deny(unsafe_code)]

pub mod content;
pub mod context;
pub mod credentials;
pub mod events;
pub mod mock;
pub mod models;
pub mod provider;
pub mod title;

pub use content::{BuiltContent, ContentBuilder, ContentPart, PlainTextBuilder};
pub use context::{PromptContext, PromptTurn};
pub use credentials::{CredentialError, CredentialResolver, ResolvedCredential, StaticKeyResolver};
pub use events::{GenerationOutcome, StreamEvent};
pub use models::ModelKind;
pub use provider::{
    GenerationRequest, GenerationService, GenerationStream, SamplingOptions, ServiceError,
    ServiceResult,
};
pub use title::{FirstLineTitleGenerator, TitleGenerator};

//! Credential resolution seam.
//!
//! Key selection policy is an external collaborator; the orchestrator only
//! needs a usable key (or a failure to surface as a validation error).

use confab_core::{AppSettings, ConversationSettings};
use serde::{Deserialize, Serialize};

/// A credential usable for one generation request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedCredential {
    /// The API key.
    pub key: String,
    /// Whether the resolver rotated to a fresh key for this request.
    pub is_new_key: bool,
}

/// Credential resolution failure.
#[derive(Debug, thiserror::Error)]
#[error("credential resolution failed: {message}")]
pub struct CredentialError {
    /// Human-readable description.
    pub message: String,
}

impl CredentialError {
    /// Create an error with the given description.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Resolves the credential to use for a request.
pub trait CredentialResolver: Send + Sync {
    /// Resolve a usable key from app and conversation settings.
    ///
    /// A conversation-pinned credential takes precedence over any
    /// app-level selection policy.
    fn resolve(
        &self,
        settings: &AppSettings,
        conversation: &ConversationSettings,
    ) -> Result<ResolvedCredential, CredentialError>;
}

/// Resolver backed by a single static key.
#[derive(Clone, Debug, Default)]
pub struct StaticKeyResolver {
    key: Option<String>,
}

impl StaticKeyResolver {
    /// Resolver that always yields `key`.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
        }
    }

    /// Resolver with no key configured (always fails).
    #[must_use]
    pub fn unconfigured() -> Self {
        Self { key: None }
    }
}

impl CredentialResolver for StaticKeyResolver {
    fn resolve(
        &self,
        _settings: &AppSettings,
        conversation: &ConversationSettings,
    ) -> Result<ResolvedCredential, CredentialError> {
        if let Some(pinned) = &conversation.pinned_credential {
            return Ok(ResolvedCredential {
                key: pinned.clone(),
                is_new_key: false,
            });
        }
        match &self.key {
            Some(key) => Ok(ResolvedCredential {
                key: key.clone(),
                is_new_key: false,
            }),
            None => Err(CredentialError::new("no API key configured")),
        }
    }
}

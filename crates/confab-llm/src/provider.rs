//! # Generation Service Trait
//!
//! Core abstraction for model-serving backends. The wire format is the
//! backend's concern; the runtime sees only a boxed [`Stream`] of
//! [`StreamEvent`]s (streaming path) or a [`GenerationOutcome`]
//! (single-shot path), both cancellable through the provided token.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::content::ContentPart;
use crate::context::PromptContext;
use crate::credentials::ResolvedCredential;
use crate::events::{GenerationOutcome, StreamEvent};
use confab_core::RequestConfig;

/// Result type alias for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Boxed stream of [`StreamEvent`]s returned by
/// [`GenerationService::stream_generate`].
pub type GenerationStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, ServiceError>> + Send>>;

/// Errors that can occur during generation service operations.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Backend returned an API error.
    #[error("backend error ({status}): {message}")]
    Backend {
        /// HTTP-like status code reported by the backend.
        status: u16,
        /// Error description.
        message: String,
        /// Whether this error can be retried.
        retryable: bool,
    },

    /// Backend could not be reached.
    #[error("backend unavailable: {message}")]
    Unavailable {
        /// Error description.
        message: String,
    },

    /// Authentication failed (expired token, invalid key).
    #[error("auth error: {message}")]
    Auth {
        /// Error description.
        message: String,
    },

    /// Rate limited by the backend.
    #[error("rate limited: retry after {retry_after_ms}ms")]
    RateLimited {
        /// Suggested retry delay in milliseconds.
        retry_after_ms: u64,
        /// Error description.
        message: String,
    },

    /// Response payload could not be decoded.
    #[error("decode error: {message}")]
    Decode {
        /// Error description.
        message: String,
    },

    /// Stream was cancelled.
    #[error("stream cancelled")]
    Cancelled,

    /// Backend-specific error.
    #[error("{message}")]
    Other {
        /// Error description.
        message: String,
    },
}

impl ServiceError {
    /// Whether this error is retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Backend { retryable, .. } => *retryable,
            Self::Unavailable { .. } | Self::RateLimited { .. } => true,
            Self::Auth { .. } | Self::Decode { .. } | Self::Cancelled | Self::Other { .. } => false,
        }
    }

    /// Error category string for event emission.
    #[must_use]
    pub fn category(&self) -> &str {
        match self {
            Self::Backend { .. } => "backend",
            Self::Unavailable { .. } => "network",
            Self::Auth { .. } => "auth",
            Self::RateLimited { .. } => "rate_limit",
            Self::Decode { .. } => "decode",
            Self::Cancelled => "cancelled",
            Self::Other { .. } => "unknown",
        }
    }
}

/// Sampling parameters for one request.
///
/// All fields are optional — backends use their defaults when unset.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplingOptions {
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,

    /// Top-p sampling.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,

    /// Whether thought streaming is requested.
    #[serde(default)]
    pub thinking_enabled: bool,
}

/// One fully-resolved request to the generation backend.
///
/// Everything environment-dependent (credential, proxy) is resolved at
/// construction time; the service never reads ambient configuration.
#[derive(Clone, Debug)]
pub struct GenerationRequest {
    /// Target model ID.
    pub model: String,
    /// Conversational history for this request.
    pub context: PromptContext,
    /// Content parts for the new turn.
    pub parts: Vec<ContentPart>,
    /// Sampling parameters.
    pub sampling: SamplingOptions,
    /// Credential to use.
    pub credential: ResolvedCredential,
    /// Request-time configuration.
    pub config: RequestConfig,
}

/// Core generation backend trait.
///
/// Implementors must be `Send + Sync` for use across async tasks. Both
/// methods must honor cooperative cancellation via `cancel`: once the token
/// fires, the backend stops producing increments (the stream may yield one
/// final `Err(ServiceError::Cancelled)`).
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Stream a response incrementally.
    ///
    /// The caller consumes events until [`StreamEvent::Done`] or an error
    /// item is yielded.
    async fn stream_generate(
        &self,
        request: &GenerationRequest,
        cancel: CancellationToken,
    ) -> ServiceResult<GenerationStream>;

    /// Produce the full response in one call (non-streaming kinds).
    async fn generate(
        &self,
        request: &GenerationRequest,
        cancel: CancellationToken,
    ) -> ServiceResult<GenerationOutcome>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_error_retryable_flag() {
        let err = ServiceError::Backend {
            status: 500,
            message: "internal".into(),
            retryable: true,
        };
        assert!(err.is_retryable());
        assert_eq!(err.category(), "backend");

        let err = ServiceError::Backend {
            status: 400,
            message: "bad request".into(),
            retryable: false,
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn unavailable_is_retryable() {
        let err = ServiceError::Unavailable {
            message: "connection refused".into(),
        };
        assert!(err.is_retryable());
        assert_eq!(err.category(), "network");
    }

    #[test]
    fn rate_limited_is_retryable() {
        let err = ServiceError::RateLimited {
            retry_after_ms: 5000,
            message: "slow down".into(),
        };
        assert!(err.is_retryable());
        assert_eq!(err.category(), "rate_limit");
    }

    #[test]
    fn cancelled_not_retryable() {
        assert!(!ServiceError::Cancelled.is_retryable());
        assert_eq!(ServiceError::Cancelled.category(), "cancelled");
    }

    #[test]
    fn error_display() {
        let err = ServiceError::Backend {
            status: 429,
            message: "too many requests".into(),
            retryable: true,
        };
        assert_eq!(err.to_string(), "backend error (429): too many requests");

        let err = ServiceError::Unavailable {
            message: "unreachable".into(),
        };
        assert_eq!(err.to_string(), "backend unavailable: unreachable");
    }

    #[test]
    fn service_is_object_safe() {
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<dyn GenerationService>();
    }

    #[test]
    fn sampling_options_serde_skips_none() {
        let opts = SamplingOptions {
            temperature: Some(0.7),
            ..SamplingOptions::default()
        };
        let json = serde_json::to_value(&opts).unwrap();
        assert!(json.get("temperature").is_some());
        assert!(json.get("topP").is_none());
    }
}

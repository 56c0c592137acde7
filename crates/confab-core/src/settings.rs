//! Application-level settings handed to the orchestrator at construction.
//!
//! Environment-dependent values (proxy, timeouts) are resolved once into a
//! [`RequestConfig`] and passed down explicitly; nothing in the request hot
//! path reads ambient configuration.

use serde::{Deserialize, Serialize};

/// Request-construction-time configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestConfig {
    /// Optional HTTP(S) proxy URL for backend calls.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_url: Option<String>,
    /// Per-request timeout in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

/// App-level settings consulted when a conversation leaves a field unset.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    /// Model used when a conversation has no model of its own.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
    /// Request-time configuration.
    #[serde(default)]
    pub request: RequestConfig,
}

//! # confab-runtime
//!
//! Generation orchestration: job lifecycle, per-conversation stream
//! exclusivity, message-version branching, and the top-level coordinator
//! that routes streamed increments into the session state store.
//!
//! Components, leaves first:
//!
//! - [`VersionLedger`](version_ledger::VersionLedger) — per-message retry
//!   locks and version branching
//! - [`StreamGate`](stream_gate::StreamGate) — at most one in-flight
//!   generation per conversation, FIFO queueing
//! - [`JobRegistry`](job_registry::JobRegistry) — active jobs, cancellation
//!   tokens, and the loading set
//! - [`Orchestrator`](orchestrator::Orchestrator) — validate → branch →
//!   seed → invoke → stream → terminate

#![deny(unsafe_code)]

pub mod context;
pub mod errors;
pub mod events;
pub mod job_registry;
pub mod orchestrator;
pub mod stream_gate;
pub mod types;
pub mod version_ledger;

pub use errors::{SendError, ValidationError};
pub use events::{JobEvent, JobEvents};
pub use job_registry::{JobRecord, JobRegistry};
pub use orchestrator::Orchestrator;
pub use stream_gate::StreamGate;
pub use types::{JobOutcome, JobStatus, SendAction, SendReceipt, SendRequest};
pub use version_ledger::VersionLedger;

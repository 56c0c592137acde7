//! Scripted generation service for deterministic tests without a backend.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::events::{GenerationOutcome, StreamEvent};
use crate::provider::{GenerationRequest, GenerationService, GenerationStream, ServiceError};
use confab_core::TokenUsage;

/// Pre-programmed responses consumed in sequence.
pub enum ScriptedResponse {
    /// Yield a sequence of stream events, then end.
    Stream(Vec<StreamEvent>),
    /// Yield events, then pend until the cancellation token fires and yield
    /// `Err(ServiceError::Cancelled)`.
    StreamThenHang(Vec<StreamEvent>),
    /// Yield events, then yield the error as the final stream item.
    StreamWithError(Vec<StreamEvent>, ServiceError),
    /// Return a full outcome from `generate`.
    Outcome(GenerationOutcome),
    /// Return an error from the service call itself.
    Error(ServiceError),
    /// Wait a duration, then behave as the inner response.
    Delay(Duration, Box<ScriptedResponse>),
}

impl ScriptedResponse {
    /// Convenience: a simple text stream ending with default usage.
    #[must_use]
    pub fn stream_text(text: &str) -> Self {
        Self::Stream(vec![
            StreamEvent::Part { text: text.into() },
            StreamEvent::Done {
                usage: Some(TokenUsage {
                    prompt_tokens: 4,
                    completion_tokens: 8,
                    total_tokens: 12,
                    cumulative_total: 12,
                }),
                grounding: None,
            },
        ])
    }

    /// Convenience: a stream that fails mid-flight after `text`.
    #[must_use]
    pub fn stream_then_error(text: &str, error: ServiceError) -> Self {
        Self::StreamWithError(vec![StreamEvent::Part { text: text.into() }], error)
    }
}

/// What each recorded call looked like.
#[derive(Clone, Debug)]
pub struct RecordedCall {
    /// Model requested.
    pub model: String,
    /// Number of context turns in the request.
    pub context_turns: usize,
    /// Number of content parts in the request.
    pub part_count: usize,
    /// Whether it was a streaming call.
    pub streaming: bool,
}

/// Mock service returning pre-programmed responses in sequence.
pub struct ScriptedService {
    responses: Mutex<VecDeque<ScriptedResponse>>,
    calls: Mutex<Vec<RecordedCall>>,
    call_count: AtomicUsize,
}

impl ScriptedService {
    /// Create a service that plays `responses` in order.
    #[must_use]
    pub fn new(responses: Vec<ScriptedResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
            call_count: AtomicUsize::new(0),
        }
    }

    /// Number of calls made so far.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Snapshot of recorded calls.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    fn record(&self, request: &GenerationRequest, streaming: bool) {
        let _ = self.call_count.fetch_add(1, Ordering::Relaxed);
        self.calls.lock().push(RecordedCall {
            model: request.model.clone(),
            context_turns: request.context.len(),
            part_count: request.parts.len(),
            streaming,
        });
    }

    fn next_response(&self) -> ScriptedResponse {
        self.responses.lock().pop_front().unwrap_or_else(|| {
            ScriptedResponse::Error(ServiceError::Other {
                message: "no scripted response left".into(),
            })
        })
    }
}

async fn unwrap_delays(mut response: ScriptedResponse) -> ScriptedResponse {
    loop {
        match response {
            ScriptedResponse::Delay(duration, inner) => {
                tokio::time::sleep(duration).await;
                response = *inner;
            }
            other => return other,
        }
    }
}

#[async_trait]
impl GenerationService for ScriptedService {
    async fn stream_generate(
        &self,
        request: &GenerationRequest,
        cancel: CancellationToken,
    ) -> Result<GenerationStream, ServiceError> {
        self.record(request, true);
        let response = unwrap_delays(self.next_response()).await;
        match response {
            ScriptedResponse::Stream(events) => {
                let stream = async_stream::stream! {
                    for event in events {
                        yield Ok(event);
                    }
                };
                Ok(Box::pin(stream))
            }
            ScriptedResponse::StreamThenHang(events) => {
                let stream = async_stream::stream! {
                    for event in events {
                        yield Ok(event);
                    }
                    cancel.cancelled().await;
                    yield Err(ServiceError::Cancelled);
                };
                Ok(Box::pin(stream))
            }
            ScriptedResponse::StreamWithError(events, error) => {
                let stream = async_stream::stream! {
                    for event in events {
                        yield Ok(event);
                    }
                    yield Err(error);
                };
                Ok(Box::pin(stream))
            }
            ScriptedResponse::Outcome(outcome) => {
                // A scripted outcome still works on the streaming path.
                let stream = async_stream::stream! {
                    for part in outcome.parts {
                        yield Ok(StreamEvent::Part { text: part });
                    }
                    for thought in outcome.thoughts {
                        yield Ok(StreamEvent::Thought { text: thought });
                    }
                    yield Ok(StreamEvent::Done {
                        usage: outcome.usage,
                        grounding: outcome.grounding,
                    });
                };
                Ok(Box::pin(stream))
            }
            ScriptedResponse::Error(error) => Err(error),
            ScriptedResponse::Delay(..) => unreachable!("delays unwrapped above"),
        }
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
        _cancel: CancellationToken,
    ) -> Result<GenerationOutcome, ServiceError> {
        self.record(request, false);
        let response = unwrap_delays(self.next_response()).await;
        match response {
            ScriptedResponse::Outcome(outcome) => Ok(outcome),
            ScriptedResponse::Stream(events) | ScriptedResponse::StreamThenHang(events) => {
                // Collapse a scripted stream into a single outcome.
                let mut outcome = GenerationOutcome::default();
                for event in events {
                    match event {
                        StreamEvent::Part { text } => outcome.parts.push(text),
                        StreamEvent::Thought { text } => outcome.thoughts.push(text),
                        StreamEvent::Done { usage, grounding } => {
                            outcome.usage = usage;
                            outcome.grounding = grounding;
                        }
                    }
                }
                Ok(outcome)
            }
            ScriptedResponse::StreamWithError(_, error) | ScriptedResponse::Error(error) => {
                Err(error)
            }
            ScriptedResponse::Delay(..) => unreachable!("delays unwrapped above"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

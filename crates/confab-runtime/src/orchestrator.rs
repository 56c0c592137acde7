//! The Generation Orchestrator.
//!
//! Coordinates one send/edit/retry request through its state machine:
//! `Validate → Branch(kind) → SeedState → Invoke → Stream → Terminate`.
//! All conversation mutation goes through the session store's atomic
//! updates; all terminal outcomes funnel through a single `complete_job`
//! call, so the loading indicator and the gate slot release exactly once.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::context::build_context;
use crate::errors::{SendError, ValidationError};
use crate::job_registry::{JobRecord, JobRegistry};
use crate::stream_gate::StreamGate;
use crate::types::{JobOutcome, SendAction, SendReceipt, SendRequest};
use crate::version_ledger::VersionLedger;
use confab_core::{
    AppSettings, AttachmentState, Conversation, ConversationId, ConversationSettings, Message,
    MessageId, Role, TokenUsage,
};
use confab_llm::models::kind_for;
use confab_llm::{
    ContentBuilder, ContentPart, CredentialResolver, GenerationRequest, GenerationService,
    ModelKind, PromptContext, ResolvedCredential, SamplingOptions, ServiceError, StreamEvent,
    TitleGenerator,
};
use confab_store::{AppliedUpdate, SessionStore, UpdateOptions};

/// Result of seeding the conversation state for one request.
struct Seeded {
    conversation_id: ConversationId,
    message_id: MessageId,
    context: PromptContext,
    parts: Vec<ContentPart>,
}

/// Per-generation scratch state: timestamps for thinking-duration
/// bookkeeping live here, not in shared cells.
struct StreamFold {
    started: Instant,
    first_part_at: Option<Instant>,
    saw_thought: bool,
}

impl StreamFold {
    fn new() -> Self {
        Self {
            started: Instant::now(),
            first_part_at: None,
            saw_thought: false,
        }
    }

    fn on_part(&mut self) {
        if self.first_part_at.is_none() {
            self.first_part_at = Some(Instant::now());
        }
    }

    fn on_thought(&mut self) {
        self.saw_thought = true;
    }

    /// Elapsed time from stream start to the first content part, reported
    /// only when thoughts were actually emitted.
    fn thinking_duration_ms(&self) -> Option<u64> {
        if !self.saw_thought {
            return None;
        }
        let end = self.first_part_at.unwrap_or_else(Instant::now);
        Some(u64::try_from(end.duration_since(self.started).as_millis()).unwrap_or(u64::MAX))
    }
}

/// Write the terminal usage/grounding update onto the target message.
fn apply_terminal(
    conversation: &mut Conversation,
    target: &MessageId,
    usage: Option<TokenUsage>,
    grounding: Option<serde_json::Value>,
    thinking_duration_ms: Option<u64>,
) {
    let prior_cumulative = conversation
        .messages
        .iter()
        .filter(|m| &m.id != target)
        .filter_map(|m| m.token_usage.map(|u| u.cumulative_total))
        .max()
        .unwrap_or(0);

    if let Some(message) = conversation.message_mut(target) {
        message.is_loading = false;
        message.completed_at = Some(Utc::now());
        message.thinking_duration_ms = thinking_duration_ms;
        message.token_usage = usage.map(|mut u| {
            u.cumulative_total = prior_cumulative.saturating_add(u.total_tokens);
            u
        });
        message.grounding = grounding;
        message.sync_active_version();
    }
    conversation.touch();
}

/// Top-level coordinator for generation jobs.
pub struct Orchestrator {
    store: Arc<SessionStore>,
    service: Arc<dyn GenerationService>,
    content: Arc<dyn ContentBuilder>,
    credentials: Arc<dyn CredentialResolver>,
    titles: Arc<dyn TitleGenerator>,
    settings: AppSettings,
    ledger: VersionLedger,
    gate: StreamGate,
    registry: Arc<JobRegistry>,
}

impl Orchestrator {
    /// Create an orchestrator over its collaborators.
    #[must_use]
    pub fn new(
        store: Arc<SessionStore>,
        service: Arc<dyn GenerationService>,
        content: Arc<dyn ContentBuilder>,
        credentials: Arc<dyn CredentialResolver>,
        titles: Arc<dyn TitleGenerator>,
        settings: AppSettings,
    ) -> Self {
        Self {
            store,
            service,
            content,
            credentials,
            titles,
            settings,
            ledger: VersionLedger::new(),
            gate: StreamGate::new(),
            registry: Arc::new(JobRegistry::new()),
        }
    }

    /// The session store.
    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// The job registry (loading set, job events).
    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    /// Cancel one job.
    pub fn cancel_job(&self, job_id: &confab_core::JobId) {
        self.registry.cancel_job(job_id);
    }

    /// Cancel every job for a conversation.
    pub fn cancel_conversation(&self, conversation_id: &ConversationId) {
        self.registry.cancel_conversation(conversation_id);
    }

    /// Delete a conversation: cancel its jobs, drop its state and gate slot.
    pub async fn delete_conversation(&self, conversation_id: &ConversationId) -> bool {
        self.registry.cancel_conversation(conversation_id);
        let removed = self.store.delete(conversation_id).await;
        self.gate.forget(conversation_id);
        removed
    }

    /// Handle one send/edit/retry request, driving the job to its terminal
    /// state.
    ///
    /// Returns the receipt on completion; validation failures, version
    /// conflicts, service errors, and cancellation surface as the matching
    /// [`SendError`] after conversation state has been made consistent.
    #[allow(clippy::too_many_lines)]
    #[instrument(skip_all, fields(action = ?request.action))]
    pub async fn send(&self, request: SendRequest) -> Result<SendReceipt, SendError> {
        // Snapshot the target conversation, if one was named.
        let existing = match &request.conversation {
            Some(id) => Some(
                self.store
                    .conversation(id)
                    .await
                    .ok_or_else(|| SendError::ConversationNotFound(id.clone()))?,
            ),
            None => None,
        };
        let conversation_settings = existing
            .as_ref()
            .map(|c| c.settings.clone())
            .unwrap_or_default();

        // Validate
        let (model, credential) = match self.validate(&request, &conversation_settings) {
            Ok(resolved) => resolved,
            Err(error) => {
                warn!(error = %error, "send request rejected");
                self.record_validation_failure(&request, &error).await;
                return Err(SendError::Validation(error));
            }
        };

        // Branch(kind)
        let kind = kind_for(&model);
        debug!(model, kind = ?kind, "dispatching generation");

        // SeedState
        let seeded = self.seed(&request, existing.as_ref(), Utc::now()).await?;
        let conversation_id = seeded.conversation_id.clone();
        let target = seeded.message_id.clone();

        // Invoke
        let job = JobRecord::new(conversation_id.clone(), target.clone());
        let job_id = job.id.clone();
        let cancel = job.cancel.clone();
        let _ = self.registry.start_job(job);

        // Media generation runs without conversational context; image
        // editing and chat consume the seeded history.
        let context = match kind {
            ModelKind::ImageGeneration | ModelKind::AudioGeneration => PromptContext::empty(),
            ModelKind::Chat | ModelKind::ImageEditing => seeded.context,
        };
        let generation_request = GenerationRequest {
            model,
            context,
            parts: seeded.parts,
            sampling: SamplingOptions {
                temperature: conversation_settings.temperature,
                top_p: conversation_settings.top_p,
                thinking_enabled: conversation_settings.thinking_enabled,
            },
            credential,
            config: self.settings.request.clone(),
        };

        // Stream, under the per-conversation exclusivity gate.
        let outcome = self
            .gate
            .run(&job_id, &conversation_id, &cancel, async {
                self.registry.mark_active(&job_id);
                if kind.supports_streaming() {
                    self.run_streaming(&generation_request, &conversation_id, &target, &cancel)
                        .await
                } else {
                    self.run_single_shot(&generation_request, &conversation_id, &target, &cancel)
                        .await
                }
            })
            .await
            .and_then(|inner| inner);

        // Terminate
        match outcome {
            Ok(()) => {
                let _ = self.registry.complete_job(&job_id, JobOutcome::Completed);
                self.maybe_generate_title(&conversation_id).await;
                info!(job_id = %job_id, conversation_id = %conversation_id, "generation completed");
                Ok(SendReceipt {
                    job_id,
                    conversation_id,
                    message_id: target,
                })
            }
            Err(SendError::Cancelled) => {
                self.finalize_cancelled(&conversation_id, &target).await;
                let _ = self.registry.complete_job(&job_id, JobOutcome::Cancelled);
                info!(job_id = %job_id, "generation cancelled");
                Err(SendError::Cancelled)
            }
            Err(error) => {
                self.finalize_failure(&conversation_id, &target, error.to_string())
                    .await;
                let _ = self.registry.complete_job(&job_id, JobOutcome::Error);
                warn!(job_id = %job_id, error = %error, "generation failed");
                Err(error)
            }
        }
    }

    // ── Validate ───────────────────────────────────────────────────────

    fn validate(
        &self,
        request: &SendRequest,
        conversation_settings: &ConversationSettings,
    ) -> Result<(String, ResolvedCredential), ValidationError> {
        let model = conversation_settings
            .model
            .clone()
            .or_else(|| self.settings.default_model.clone())
            .ok_or(ValidationError::NoModelSelected)?;
        let kind = kind_for(&model);

        for attachment in &request.attachments {
            match attachment.state {
                AttachmentState::Processing => {
                    return Err(ValidationError::AttachmentProcessing {
                        name: attachment.name.clone(),
                    });
                }
                AttachmentState::Failed if !attachment.accepted => {
                    return Err(ValidationError::AttachmentFailed {
                        name: attachment.name.clone(),
                    });
                }
                AttachmentState::Failed | AttachmentState::Ready => {}
            }
        }

        // A retry re-sends the original prompt; the request text is unused.
        let is_retry = matches!(request.action, SendAction::Retry { .. });
        if !is_retry
            && kind.is_text_capable()
            && request.text.trim().is_empty()
            && request.attachments.is_empty()
        {
            return Err(ValidationError::EmptyPrompt);
        }

        let credential = self
            .credentials
            .resolve(&self.settings, conversation_settings)
            .map_err(|e| ValidationError::NoCredential { detail: e.message })?;

        Ok((model, credential))
    }

    /// Rejections are never silent: synthesize an error-role message into
    /// a new or existing conversation.
    async fn record_validation_failure(&self, request: &SendRequest, error: &ValidationError) {
        let notice = Message::error_notice(error.to_string());
        match &request.conversation {
            Some(id) => {
                let _ = self
                    .store
                    .atomic_update(id, UpdateOptions::durable("validation-error"), move |mut c| {
                        c.push(notice);
                        c
                    })
                    .await;
            }
            None => {
                let mut conversation = Conversation::new(ConversationSettings::default());
                if !request.text.trim().is_empty() {
                    conversation.push(Message::user(
                        request.text.clone(),
                        request.attachments.clone(),
                    ));
                }
                conversation.push(notice);
                let _ = self.store.create(conversation).await;
            }
        }
    }

    // ── SeedState ──────────────────────────────────────────────────────

    async fn seed(
        &self,
        request: &SendRequest,
        existing: Option<&Conversation>,
        now: DateTime<Utc>,
    ) -> Result<Seeded, SendError> {
        match (&request.action, existing) {
            (SendAction::Send, None) => {
                let built = self.content.build(&request.text, &request.attachments);
                let user = Message::user(request.text.clone(), built.enriched_files);
                let placeholder = Message::placeholder(now);
                let message_id = placeholder.id.clone();
                let mut conversation = Conversation::new(ConversationSettings::default());
                conversation.push(user);
                conversation.push(placeholder);
                let conversation_id = self.store.create(conversation).await;
                Ok(Seeded {
                    conversation_id,
                    message_id,
                    context: PromptContext::empty(),
                    parts: built.parts,
                })
            }
            (SendAction::Send, Some(conversation)) => {
                let built = self.content.build(&request.text, &request.attachments);
                let context = build_context(conversation, None);
                let user = Message::user(request.text.clone(), built.enriched_files);
                let placeholder = Message::placeholder(now);
                let message_id = placeholder.id.clone();
                let conversation_id = conversation.id.clone();
                let applied = self
                    .store
                    .atomic_update(
                        &conversation_id,
                        UpdateOptions::durable("send-seed"),
                        move |mut conv| {
                            conv.push(user);
                            conv.push(placeholder);
                            conv
                        },
                    )
                    .await;
                if applied == AppliedUpdate::Skipped {
                    return Err(SendError::ConversationNotFound(conversation_id));
                }
                Ok(Seeded {
                    conversation_id,
                    message_id,
                    context,
                    parts: built.parts,
                })
            }
            (SendAction::Edit { message_id }, Some(conversation)) => {
                let position = conversation.message_index(message_id).ok_or_else(|| {
                    SendError::Internal("edited message no longer exists".into())
                })?;
                let built = self.content.build(&request.text, &request.attachments);
                let context = build_context(conversation, Some(position));
                let user = Message::user(request.text.clone(), built.enriched_files);
                let placeholder = Message::placeholder(now);
                let new_message_id = placeholder.id.clone();
                let conversation_id = conversation.id.clone();
                let applied = self
                    .store
                    .atomic_update(
                        &conversation_id,
                        UpdateOptions::durable("edit-seed"),
                        move |mut conv| {
                            // Destructive by design: everything after the
                            // edit point is discarded.
                            conv.messages.truncate(position);
                            conv.messages.push(user);
                            conv.messages.push(placeholder);
                            conv.touch();
                            conv
                        },
                    )
                    .await;
                if applied == AppliedUpdate::Skipped {
                    return Err(SendError::ConversationNotFound(conversation_id));
                }
                Ok(Seeded {
                    conversation_id,
                    message_id: new_message_id,
                    context,
                    parts: built.parts,
                })
            }
            (SendAction::Retry { message_id }, Some(conversation)) => {
                let position = conversation.message_index(message_id).ok_or_else(|| {
                    SendError::Internal("retried message no longer exists".into())
                })?;
                let target = &conversation.messages[position];
                if target.role != Role::Model {
                    return Err(SendError::Internal(
                        "only model messages can be retried".into(),
                    ));
                }
                let prompt_position = conversation.messages[..position]
                    .iter()
                    .rposition(|m| m.role == Role::User)
                    .ok_or_else(|| {
                        SendError::Internal("no user turn precedes the retried message".into())
                    })?;
                let prompt = &conversation.messages[prompt_position];
                let built = self.content.build(&prompt.content, &prompt.attachments);
                let context = build_context(conversation, Some(prompt_position));

                let history = self.ledger.begin_retry(target, &conversation.id, now)?;
                let conversation_id = conversation.id.clone();
                let target_id = message_id.clone();
                let applied = self
                    .store
                    .atomic_update(
                        &conversation_id,
                        UpdateOptions::durable("retry-seed"),
                        move |mut conv| {
                            if let Some(message) = conv.message_mut(&target_id) {
                                message.reset_for_retry(history, now);
                            }
                            conv.touch();
                            conv
                        },
                    )
                    .await;
                // The lock guards the list edit, not the whole generation.
                self.ledger.complete_retry(message_id);
                if applied == AppliedUpdate::Skipped {
                    return Err(SendError::ConversationNotFound(conversation_id));
                }
                Ok(Seeded {
                    conversation_id,
                    message_id: message_id.clone(),
                    context,
                    parts: built.parts,
                })
            }
            (SendAction::Edit { .. } | SendAction::Retry { .. }, None) => Err(SendError::Internal(
                "edit and retry require an existing conversation".into(),
            )),
        }
    }

    // ── Stream ─────────────────────────────────────────────────────────

    async fn run_streaming(
        &self,
        request: &GenerationRequest,
        conversation_id: &ConversationId,
        target: &MessageId,
        cancel: &CancellationToken,
    ) -> Result<(), SendError> {
        let mut stream = self.service.stream_generate(request, cancel.clone()).await?;
        let mut fold = StreamFold::new();

        loop {
            // biased: prefer cancellation when both an event and the token
            // are ready.
            let event = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(SendError::Cancelled),
                event = stream.next() => event,
            };

            match event {
                None => {
                    return Err(SendError::Internal(
                        "stream ended without a terminal event".into(),
                    ));
                }
                Some(Err(ServiceError::Cancelled)) => return Err(SendError::Cancelled),
                Some(Err(error)) => return Err(error.into()),
                Some(Ok(StreamEvent::Part { text })) => {
                    fold.on_part();
                    let target = target.clone();
                    let _ = self
                        .store
                        .atomic_update(
                            conversation_id,
                            UpdateOptions::transient("stream-part"),
                            move |mut conv| {
                                if let Some(message) = conv.message_mut(&target) {
                                    message.content.push_str(&text);
                                }
                                conv
                            },
                        )
                        .await;
                }
                Some(Ok(StreamEvent::Thought { text })) => {
                    fold.on_thought();
                    let target = target.clone();
                    let _ = self
                        .store
                        .atomic_update(
                            conversation_id,
                            UpdateOptions::transient("stream-thought"),
                            move |mut conv| {
                                if let Some(message) = conv.message_mut(&target) {
                                    message
                                        .thinking
                                        .get_or_insert_with(String::new)
                                        .push_str(&text);
                                }
                                conv
                            },
                        )
                        .await;
                }
                Some(Ok(StreamEvent::Done { usage, grounding })) => {
                    let thinking_ms = fold.thinking_duration_ms();
                    let target = target.clone();
                    let _ = self
                        .store
                        .atomic_update(
                            conversation_id,
                            UpdateOptions::durable("stream-done"),
                            move |mut conv| {
                                apply_terminal(&mut conv, &target, usage, grounding, thinking_ms);
                                conv
                            },
                        )
                        .await;
                    return Ok(());
                }
            }
        }
    }

    /// Non-streaming kinds apply the full result in the same shape as the
    /// streaming path: all parts, then thoughts, then usage.
    async fn run_single_shot(
        &self,
        request: &GenerationRequest,
        conversation_id: &ConversationId,
        target: &MessageId,
        cancel: &CancellationToken,
    ) -> Result<(), SendError> {
        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(SendError::Cancelled),
            result = self.service.generate(request, cancel.clone()) => result?,
        };

        let parts = outcome.parts;
        let thoughts = outcome.thoughts;
        let usage = outcome.usage;
        let grounding = outcome.grounding;
        let target = target.clone();
        let _ = self
            .store
            .atomic_update(
                conversation_id,
                UpdateOptions::durable("single-shot"),
                move |mut conv| {
                    if let Some(message) = conv.message_mut(&target) {
                        for part in &parts {
                            message.content.push_str(part);
                        }
                        for thought in &thoughts {
                            message
                                .thinking
                                .get_or_insert_with(String::new)
                                .push_str(thought);
                        }
                    }
                    apply_terminal(&mut conv, &target, usage, grounding, None);
                    conv
                },
            )
            .await;
        Ok(())
    }

    // ── Terminate helpers ──────────────────────────────────────────────

    async fn finalize_cancelled(&self, conversation_id: &ConversationId, target: &MessageId) {
        let target = target.clone();
        let _ = self
            .store
            .atomic_update(
                conversation_id,
                UpdateOptions::durable("job-cancelled"),
                move |mut conv| {
                    if let Some(message) = conv.message_mut(&target) {
                        // Whatever partial content already streamed stays.
                        message.is_loading = false;
                        message.completed_at = Some(Utc::now());
                        message.sync_active_version();
                    }
                    conv.touch();
                    conv
                },
            )
            .await;
    }

    async fn finalize_failure(
        &self,
        conversation_id: &ConversationId,
        target: &MessageId,
        detail: String,
    ) {
        let target = target.clone();
        let _ = self
            .store
            .atomic_update(
                conversation_id,
                UpdateOptions::durable("job-error"),
                move |mut conv| {
                    if let Some(message) = conv.message_mut(&target) {
                        message.record_failure(detail, Utc::now());
                        message.sync_active_version();
                    }
                    conv.touch();
                    conv
                },
            )
            .await;
    }

    async fn maybe_generate_title(&self, conversation_id: &ConversationId) {
        let Some(conversation) = self.store.conversation(conversation_id).await else {
            return;
        };
        if !conversation.has_placeholder_title() {
            return;
        }
        match self.titles.generate(&conversation.messages).await {
            Ok(title) => {
                let _ = self
                    .store
                    .atomic_update(
                        conversation_id,
                        UpdateOptions::durable("title"),
                        move |mut conv| {
                            if conv.has_placeholder_title() {
                                conv.title = title;
                            }
                            conv
                        },
                    )
                    .await;
            }
            Err(error) => warn!(error = %error, "title generation failed"),
        }
    }
}

//! End-to-end orchestrator behavior against a scripted generation service.

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use confab_core::{
    AppSettings, AttachmentRef, AttachmentState, Conversation, ConversationId,
    ConversationSettings, Message, RequestConfig, Role, TokenUsage,
};
use confab_llm::mock::{ScriptedResponse, ScriptedService};
use confab_llm::{
    CredentialResolver, FirstLineTitleGenerator, GenerationOutcome, PlainTextBuilder,
    ServiceError, StaticKeyResolver, StreamEvent,
};
use confab_runtime::{
    JobEvent, JobOutcome, Orchestrator, SendError, SendRequest, ValidationError,
};
use confab_store::{SessionStore, UpdateOptions};

fn default_settings() -> AppSettings {
    AppSettings {
        default_model: Some("chat-standard".into()),
        request: RequestConfig::default(),
    }
}

fn orchestrator_with(
    responses: Vec<ScriptedResponse>,
    credentials: Arc<dyn CredentialResolver>,
    settings: AppSettings,
) -> (Arc<Orchestrator>, Arc<ScriptedService>) {
    let service = Arc::new(ScriptedService::new(responses));
    let orchestrator = Orchestrator::new(
        Arc::new(SessionStore::in_memory()),
        service.clone(),
        Arc::new(PlainTextBuilder),
        credentials,
        Arc::new(FirstLineTitleGenerator),
        settings,
    );
    (Arc::new(orchestrator), service)
}

fn orchestrator(responses: Vec<ScriptedResponse>) -> (Arc<Orchestrator>, Arc<ScriptedService>) {
    orchestrator_with(
        responses,
        Arc::new(StaticKeyResolver::new("test-key")),
        default_settings(),
    )
}

fn usage(total: u32) -> TokenUsage {
    TokenUsage {
        prompt_tokens: total / 2,
        completion_tokens: total - total / 2,
        total_tokens: total,
        cumulative_total: 0,
    }
}

fn stream_reply(text: &str, total_tokens: u32) -> ScriptedResponse {
    ScriptedResponse::Stream(vec![
        StreamEvent::Part { text: text.into() },
        StreamEvent::Done {
            usage: Some(usage(total_tokens)),
            grounding: None,
        },
    ])
}

async fn empty_conversation(
    orchestrator: &Orchestrator,
    settings: ConversationSettings,
) -> ConversationId {
    orchestrator
        .store()
        .create(Conversation::new(settings))
        .await
}

// ─────────────────────────────────────────────────────────────────────────────
// Send
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn send_creates_conversation_and_streams_reply() {
    let (orchestrator, service) = orchestrator(vec![ScriptedResponse::Stream(vec![
        StreamEvent::Part {
            text: "Hello, ".into(),
        },
        StreamEvent::Part {
            text: "world".into(),
        },
        StreamEvent::Done {
            usage: Some(usage(5)),
            grounding: None,
        },
    ])]);

    let receipt = orchestrator
        .send(SendRequest::new_conversation("Say hello\nplease"))
        .await
        .unwrap();

    let conversation = orchestrator
        .store()
        .conversation(&receipt.conversation_id)
        .await
        .unwrap();
    assert_eq!(conversation.messages.len(), 2);
    assert_eq!(conversation.messages[0].role, Role::User);
    assert_eq!(conversation.messages[0].content, "Say hello\nplease");

    let reply = &conversation.messages[1];
    assert_eq!(reply.id, receipt.message_id);
    assert_eq!(reply.role, Role::Model);
    assert_eq!(reply.content, "Hello, world");
    assert!(!reply.is_loading);
    assert!(reply.completed_at.is_some());
    assert_eq!(reply.token_usage.unwrap().total_tokens, 5);
    assert_eq!(reply.token_usage.unwrap().cumulative_total, 5);

    // Title generated from the first user line.
    assert_eq!(conversation.title, "Say hello");

    // Job gone, loading cleared.
    assert_eq!(orchestrator.registry().active_count(), 0);
    assert!(!orchestrator.registry().is_loading(&receipt.conversation_id));

    assert_eq!(service.call_count(), 1);
    let calls = service.calls();
    assert!(calls[0].streaming);
    assert_eq!(calls[0].context_turns, 0);
    assert_eq!(calls[0].part_count, 1);
}

#[tokio::test]
async fn continuation_includes_prior_history() {
    let (orchestrator, service) = orchestrator(vec![
        stream_reply("First answer", 5),
        stream_reply("Second answer", 7),
    ]);

    let receipt = orchestrator
        .send(SendRequest::new_conversation("First question"))
        .await
        .unwrap();
    let conversation_id = receipt.conversation_id;

    let _ = orchestrator
        .send(SendRequest::to_conversation(
            conversation_id.clone(),
            "Second question",
        ))
        .await
        .unwrap();

    let conversation = orchestrator
        .store()
        .conversation(&conversation_id)
        .await
        .unwrap();
    assert_eq!(conversation.messages.len(), 4);
    assert_eq!(conversation.messages[3].content, "Second answer");

    // Cumulative usage accumulates across the conversation.
    assert_eq!(
        conversation.messages[3].token_usage.unwrap().cumulative_total,
        12
    );

    let calls = service.calls();
    assert_eq!(calls[1].context_turns, 2, "prior user+model turns only");
}

#[tokio::test]
async fn thoughts_fold_into_thinking_field() {
    let (orchestrator, _service) = orchestrator(vec![ScriptedResponse::Stream(vec![
        StreamEvent::Thought {
            text: "Considering...".into(),
        },
        StreamEvent::Part {
            text: "Answer".into(),
        },
        StreamEvent::Done {
            usage: None,
            grounding: Some(serde_json::json!({"sources": ["a"]})),
        },
    ])]);

    let receipt = orchestrator
        .send(SendRequest::new_conversation("Think about it"))
        .await
        .unwrap();

    let conversation = orchestrator
        .store()
        .conversation(&receipt.conversation_id)
        .await
        .unwrap();
    let reply = &conversation.messages[1];
    assert_eq!(reply.thinking.as_deref(), Some("Considering..."));
    assert!(reply.thinking_duration_ms.is_some());
    assert!(reply.grounding.is_some());
}

// ─────────────────────────────────────────────────────────────────────────────
// Validation
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn empty_prompt_synthesizes_error_message() {
    let (orchestrator, service) = orchestrator(vec![]);

    let result = orchestrator.send(SendRequest::new_conversation("   ")).await;
    assert_matches!(
        result,
        Err(SendError::Validation(ValidationError::EmptyPrompt))
    );

    // Never silently dropped: a new conversation records the rejection.
    let list = orchestrator.store().list().await;
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].messages.len(), 1);
    assert_eq!(list[0].messages[0].role, Role::Error);
    assert!(!list[0].messages[0].content.is_empty());

    // No job was created, no call made.
    assert_eq!(service.call_count(), 0);
    assert_eq!(orchestrator.registry().active_count(), 0);
}

#[tokio::test]
async fn processing_attachment_rejected_into_existing_conversation() {
    let (orchestrator, service) = orchestrator(vec![]);
    let conversation_id =
        empty_conversation(&orchestrator, ConversationSettings::default()).await;

    let attachment = AttachmentRef {
        id: "att-1".into(),
        name: "scan.pdf".into(),
        mime_type: "application/pdf".into(),
        uri: "mem://scan".into(),
        size_bytes: None,
        state: AttachmentState::Processing,
        accepted: false,
    };
    let result = orchestrator
        .send(
            SendRequest::to_conversation(conversation_id.clone(), "look at this")
                .with_attachments(vec![attachment]),
        )
        .await;

    assert_matches!(
        result,
        Err(SendError::Validation(
            ValidationError::AttachmentProcessing { .. }
        ))
    );
    let conversation = orchestrator
        .store()
        .conversation(&conversation_id)
        .await
        .unwrap();
    assert_eq!(conversation.messages.len(), 1);
    assert_eq!(conversation.messages[0].role, Role::Error);
    assert_eq!(service.call_count(), 0);
}

#[tokio::test]
async fn accepted_failed_attachment_passes_validation() {
    let (orchestrator, _service) = orchestrator(vec![stream_reply("ok", 2)]);

    let attachment = AttachmentRef {
        id: "att-1".into(),
        name: "broken.png".into(),
        mime_type: "image/png".into(),
        uri: "mem://broken".into(),
        size_bytes: None,
        state: AttachmentState::Failed,
        accepted: true,
    };
    let result = orchestrator
        .send(SendRequest::new_conversation("use it anyway").with_attachments(vec![attachment]))
        .await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn missing_credential_rejected() {
    let (orchestrator, _service) = orchestrator_with(
        vec![],
        Arc::new(StaticKeyResolver::unconfigured()),
        default_settings(),
    );

    let result = orchestrator.send(SendRequest::new_conversation("hi")).await;
    assert_matches!(
        result,
        Err(SendError::Validation(ValidationError::NoCredential { .. }))
    );
}

#[tokio::test]
async fn missing_model_rejected() {
    let (orchestrator, _service) = orchestrator_with(
        vec![],
        Arc::new(StaticKeyResolver::new("key")),
        AppSettings::default(),
    );

    let result = orchestrator.send(SendRequest::new_conversation("hi")).await;
    assert_matches!(
        result,
        Err(SendError::Validation(ValidationError::NoModelSelected))
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Edit
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn edit_truncates_and_reseeds() {
    let (orchestrator, service) = orchestrator(vec![
        stream_reply("answer one", 5),
        stream_reply("answer two", 5),
        stream_reply("answer for edit", 5),
    ]);

    let receipt = orchestrator
        .send(SendRequest::new_conversation("question one"))
        .await
        .unwrap();
    let conversation_id = receipt.conversation_id;
    let _ = orchestrator
        .send(SendRequest::to_conversation(
            conversation_id.clone(),
            "question two",
        ))
        .await
        .unwrap();

    // Edit the second user message (index 2 of 4).
    let before = orchestrator
        .store()
        .conversation(&conversation_id)
        .await
        .unwrap();
    assert_eq!(before.messages.len(), 4);
    let edited_id = before.messages[2].id.clone();

    let _ = orchestrator
        .send(SendRequest::edit(
            conversation_id.clone(),
            edited_id,
            "question two, corrected",
        ))
        .await
        .unwrap();

    let after = orchestrator
        .store()
        .conversation(&conversation_id)
        .await
        .unwrap();
    // [0..2) retained, edited message replaced, placeholder appended.
    assert_eq!(after.messages.len(), 4);
    assert_eq!(after.messages[0].content, "question one");
    assert_eq!(after.messages[1].content, "answer one");
    assert_eq!(after.messages[2].content, "question two, corrected");
    assert_eq!(after.messages[2].role, Role::User);
    assert_eq!(after.messages[3].content, "answer for edit");

    // The request context stops before the edit point.
    let calls = service.calls();
    assert_eq!(calls[2].context_turns, 2);
}

#[tokio::test]
async fn edit_at_first_message_discards_everything_after() {
    let (orchestrator, _service) = orchestrator(vec![
        stream_reply("first answer", 5),
        stream_reply("fresh answer", 5),
    ]);

    let receipt = orchestrator
        .send(SendRequest::new_conversation("original question"))
        .await
        .unwrap();
    let conversation_id = receipt.conversation_id;
    let first_user = orchestrator
        .store()
        .conversation(&conversation_id)
        .await
        .unwrap()
        .messages[0]
        .id
        .clone();

    let _ = orchestrator
        .send(SendRequest::edit(
            conversation_id.clone(),
            first_user,
            "replacement question",
        ))
        .await
        .unwrap();

    let after = orchestrator
        .store()
        .conversation(&conversation_id)
        .await
        .unwrap();
    assert_eq!(after.messages.len(), 2);
    assert_eq!(after.messages[0].content, "replacement question");
    assert_eq!(after.messages[1].content, "fresh answer");
}

// ─────────────────────────────────────────────────────────────────────────────
// Retry
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn retry_branches_version_history() {
    let (orchestrator, service) = orchestrator(vec![
        stream_reply("Hello, world", 5),
        stream_reply("Take two", 5),
        stream_reply("Take three", 5),
    ]);

    let receipt = orchestrator
        .send(SendRequest::new_conversation("greet me"))
        .await
        .unwrap();
    let conversation_id = receipt.conversation_id;
    let model_message = receipt.message_id;

    // First retry: original becomes version 0, new rendering is version 1.
    let _ = orchestrator
        .send(SendRequest::retry(
            conversation_id.clone(),
            model_message.clone(),
        ))
        .await
        .unwrap();

    let conversation = orchestrator
        .store()
        .conversation(&conversation_id)
        .await
        .unwrap();
    assert_eq!(conversation.messages.len(), 2, "retry rewrites in place");
    let reply = conversation.message(&model_message).unwrap();
    assert_eq!(reply.content, "Take two");
    let history = reply.versions.as_ref().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history.active_index, 1);
    assert_eq!(history.versions[0].content, "Hello, world");
    assert_eq!(history.versions[1].content, "Take two");

    // Second retry: history grows to 3, active advances to 2.
    let _ = orchestrator
        .send(SendRequest::retry(
            conversation_id.clone(),
            model_message.clone(),
        ))
        .await
        .unwrap();

    let conversation = orchestrator
        .store()
        .conversation(&conversation_id)
        .await
        .unwrap();
    let reply = conversation.message(&model_message).unwrap();
    assert_eq!(reply.content, "Take three");
    let history = reply.versions.as_ref().unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history.active_index, 2);
    assert_eq!(history.versions[1].content, "Take two");

    // The retry re-sends the original prompt with no stale context.
    let calls = service.calls();
    assert_eq!(calls[1].context_turns, 0);
    assert!(calls[1].part_count >= 1);
}

#[tokio::test]
async fn retry_of_user_message_is_rejected() {
    let (orchestrator, _service) = orchestrator(vec![stream_reply("answer", 5)]);

    let receipt = orchestrator
        .send(SendRequest::new_conversation("question"))
        .await
        .unwrap();
    let conversation_id = receipt.conversation_id;
    let user_id = orchestrator
        .store()
        .conversation(&conversation_id)
        .await
        .unwrap()
        .messages[0]
        .id
        .clone();

    let result = orchestrator
        .send(SendRequest::retry(conversation_id, user_id))
        .await;
    assert_matches!(result, Err(SendError::Internal(_)));
}

// ─────────────────────────────────────────────────────────────────────────────
// Failure and cancellation
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn mid_stream_failure_recorded_on_message() {
    let (orchestrator, _service) =
        orchestrator(vec![ScriptedResponse::stream_then_error(
            "partial ",
            ServiceError::Backend {
                status: 500,
                message: "backend exploded".into(),
                retryable: true,
            },
        )]);

    let result = orchestrator
        .send(SendRequest::new_conversation("doomed request"))
        .await;
    assert_matches!(result, Err(SendError::Service(_)));

    let list = orchestrator.store().list().await;
    let reply = &list[0].messages[1];
    // Partial content stays; the failure lands on the message.
    assert_eq!(reply.content, "partial ");
    assert!(reply.error.as_deref().unwrap().contains("backend exploded"));
    assert!(!reply.is_loading);

    // The conversation is eligible for a new job.
    assert_eq!(orchestrator.registry().active_count(), 0);
    assert!(!orchestrator.registry().is_loading(&list[0].id));
}

#[tokio::test]
async fn cancel_mid_stream_keeps_partial_content() {
    let (orchestrator, _service) =
        orchestrator(vec![ScriptedResponse::StreamThenHang(vec![
            StreamEvent::Part {
                text: "partial answer".into(),
            },
        ])]);
    let conversation_id =
        empty_conversation(&orchestrator, ConversationSettings::default()).await;

    let handle = {
        let orchestrator = orchestrator.clone();
        let conversation_id = conversation_id.clone();
        tokio::spawn(async move {
            orchestrator
                .send(SendRequest::to_conversation(conversation_id, "stop me"))
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(orchestrator.registry().is_loading(&conversation_id));
    orchestrator.cancel_conversation(&conversation_id);

    let result = handle.await.unwrap();
    assert_matches!(result, Err(SendError::Cancelled));

    let conversation = orchestrator
        .store()
        .conversation(&conversation_id)
        .await
        .unwrap();
    let reply = &conversation.messages[1];
    assert_eq!(reply.content, "partial answer");
    assert!(!reply.is_loading);
    assert!(reply.error.is_none());
    assert_eq!(orchestrator.registry().active_count(), 0);
}

#[tokio::test]
async fn cancelling_conversation_drops_queued_job_without_running_it() {
    let (orchestrator, service) =
        orchestrator(vec![ScriptedResponse::StreamThenHang(vec![
            StreamEvent::Part { text: "one".into() },
        ])]);
    let conversation_id =
        empty_conversation(&orchestrator, ConversationSettings::default()).await;

    let first = {
        let orchestrator = orchestrator.clone();
        let conversation_id = conversation_id.clone();
        tokio::spawn(async move {
            orchestrator
                .send(SendRequest::to_conversation(conversation_id, "first"))
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;

    let second = {
        let orchestrator = orchestrator.clone();
        let conversation_id = conversation_id.clone();
        tokio::spawn(async move {
            orchestrator
                .send(SendRequest::to_conversation(conversation_id, "second"))
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;

    orchestrator.cancel_conversation(&conversation_id);

    assert_matches!(first.await.unwrap(), Err(SendError::Cancelled));
    assert_matches!(second.await.unwrap(), Err(SendError::Cancelled));

    // The queued job never reached the service.
    assert_eq!(service.call_count(), 1);

    let conversation = orchestrator
        .store()
        .conversation(&conversation_id)
        .await
        .unwrap();
    assert_eq!(conversation.messages.len(), 4);
    assert!(conversation.messages.iter().all(|m| !m.is_loading));
    assert_eq!(orchestrator.registry().active_count(), 0);
}

#[tokio::test]
async fn delete_conversation_mid_job_is_silent() {
    let (orchestrator, _service) =
        orchestrator(vec![ScriptedResponse::StreamThenHang(vec![
            StreamEvent::Part {
                text: "orphaned".into(),
            },
        ])]);
    let conversation_id =
        empty_conversation(&orchestrator, ConversationSettings::default()).await;

    let handle = {
        let orchestrator = orchestrator.clone();
        let conversation_id = conversation_id.clone();
        tokio::spawn(async move {
            orchestrator
                .send(SendRequest::to_conversation(conversation_id, "hello"))
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(orchestrator.delete_conversation(&conversation_id).await);

    // The in-flight job unwinds as a cancellation; updates against the
    // deleted conversation are silent no-ops.
    assert_matches!(handle.await.unwrap(), Err(SendError::Cancelled));
    assert!(orchestrator.store().is_empty());
    assert_eq!(orchestrator.registry().active_count(), 0);
}

// ─────────────────────────────────────────────────────────────────────────────
// Queueing
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn queued_sends_to_one_conversation_both_complete() {
    let (orchestrator, service) = orchestrator(vec![
        ScriptedResponse::Delay(
            Duration::from_millis(40),
            Box::new(stream_reply("first answer", 5)),
        ),
        stream_reply("second answer", 5),
    ]);
    let conversation_id =
        empty_conversation(&orchestrator, ConversationSettings::default()).await;

    let first = {
        let orchestrator = orchestrator.clone();
        let conversation_id = conversation_id.clone();
        tokio::spawn(async move {
            orchestrator
                .send(SendRequest::to_conversation(conversation_id, "first"))
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    let second = {
        let orchestrator = orchestrator.clone();
        let conversation_id = conversation_id.clone();
        tokio::spawn(async move {
            orchestrator
                .send(SendRequest::to_conversation(conversation_id, "second"))
                .await
        })
    };

    assert!(first.await.unwrap().is_ok());
    assert!(second.await.unwrap().is_ok());
    assert_eq!(service.call_count(), 2);

    let conversation = orchestrator
        .store()
        .conversation(&conversation_id)
        .await
        .unwrap();
    assert_eq!(conversation.messages.len(), 4);
    let contents: Vec<&str> = conversation
        .messages
        .iter()
        .map(|m| m.content.as_str())
        .collect();
    assert_eq!(
        contents,
        vec!["first", "first answer", "second", "second answer"]
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Single-shot kinds
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn media_generation_is_single_shot_without_context() {
    let (orchestrator, service) = orchestrator(vec![ScriptedResponse::Outcome(
        GenerationOutcome {
            parts: vec!["img://cat".into()],
            usage: Some(usage(3)),
            ..GenerationOutcome::default()
        },
    )]);
    let conversation_id = empty_conversation(
        &orchestrator,
        ConversationSettings {
            model: Some("image-large".into()),
            ..ConversationSettings::default()
        },
    )
    .await;

    let receipt = orchestrator
        .send(SendRequest::to_conversation(
            conversation_id.clone(),
            "a cat wearing a hat",
        ))
        .await
        .unwrap();

    let calls = service.calls();
    assert!(!calls[0].streaming, "media kinds never stream");
    assert_eq!(calls[0].context_turns, 0);

    let conversation = orchestrator
        .store()
        .conversation(&conversation_id)
        .await
        .unwrap();
    let reply = conversation.message(&receipt.message_id).unwrap();
    assert_eq!(reply.content, "img://cat");
    assert!(!reply.is_loading);
}

#[tokio::test]
async fn image_editing_consumes_prior_messages_as_context() {
    let (orchestrator, service) = orchestrator(vec![ScriptedResponse::Outcome(
        GenerationOutcome {
            parts: vec!["img://edited".into()],
            ..GenerationOutcome::default()
        },
    )]);

    let mut seeded = Conversation::new(ConversationSettings {
        model: Some("image-edit-v2".into()),
        ..ConversationSettings::default()
    });
    seeded.push(Message::user("here is a photo", vec![]));
    let mut prior = Message::placeholder(chrono::Utc::now());
    prior.content = "img://original".into();
    prior.is_loading = false;
    seeded.push(prior);
    let conversation_id = orchestrator.store().create(seeded).await;

    let _ = orchestrator
        .send(SendRequest::to_conversation(
            conversation_id.clone(),
            "make it blue",
        ))
        .await
        .unwrap();

    let calls = service.calls();
    assert!(!calls[0].streaming);
    assert_eq!(
        calls[0].context_turns, 2,
        "image editing sees prior conversation messages"
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Observability
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn job_events_emitted_in_order() {
    let (orchestrator, _service) = orchestrator(vec![stream_reply("ok", 2)]);
    let mut rx = orchestrator.registry().subscribe();

    let receipt = orchestrator
        .send(SendRequest::new_conversation("ping"))
        .await
        .unwrap();

    let started = rx.try_recv().unwrap();
    assert_matches!(started, JobEvent::Started { job_id, .. } => {
        assert_eq!(job_id, receipt.job_id);
    });
    let finished = rx.try_recv().unwrap();
    assert_matches!(finished, JobEvent::Finished { outcome, .. } => {
        assert_eq!(outcome, JobOutcome::Completed);
    });
}

#[tokio::test]
async fn title_generation_skips_non_placeholder_titles() {
    let (orchestrator, _service) = orchestrator(vec![
        stream_reply("answer one", 5),
        stream_reply("answer two", 5),
    ]);

    let receipt = orchestrator
        .send(SendRequest::new_conversation("Original topic"))
        .await
        .unwrap();
    let conversation_id = receipt.conversation_id;

    // The user renames the conversation.
    let _ = orchestrator
        .store()
        .atomic_update(
            &conversation_id,
            UpdateOptions::durable("rename"),
            |mut conv| {
                conv.title = "Custom title".into();
                conv
            },
        )
        .await;

    let _ = orchestrator
        .send(SendRequest::to_conversation(
            conversation_id.clone(),
            "Another question",
        ))
        .await
        .unwrap();

    let conversation = orchestrator
        .store()
        .conversation(&conversation_id)
        .await
        .unwrap();
    assert_eq!(conversation.title, "Custom title");
}

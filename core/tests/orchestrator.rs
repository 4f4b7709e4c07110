use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use slide_common::SlideConfig;
use slide_core::error::{GenerationError, ModelError};
use slide_core::{
    DocumentIngestor, IngestConfig, ModelClient, ModelRequest, ModelSummarizer, RequestPurpose,
    RetryPolicy, SlideError, SlideOrchestrator,
};
use slide_protocol::{EditRequest, GenerateRequest, SessionId, SlideDeck, SlideRecord};

/// Replays queued slide responses in order and answers summaries with a
/// fixed marker. Every request is recorded.
struct ScriptedClient {
    responses: Mutex<VecDeque<Result<String, ModelError>>>,
    requests: Mutex<Vec<ModelRequest>>,
    delay: Duration,
}

impl ScriptedClient {
    fn new(responses: Vec<Result<String, ModelError>>) -> Arc<Self> {
        Self::with_delay(responses, Duration::ZERO)
    }

    fn with_delay(responses: Vec<Result<String, ModelError>>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
            delay,
        })
    }

    fn slide_requests(&self) -> Vec<ModelRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.purpose != RequestPurpose::Summarize)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ModelClient for ScriptedClient {
    async fn complete(&self, request: ModelRequest) -> Result<String, ModelError> {
        let purpose = request.purpose;
        self.requests.lock().unwrap().push(request);
        if purpose == RequestPurpose::Summarize {
            return Ok("condensed".to_string());
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ModelError::EmptyResponse))
    }
}

fn ok(json: &str) -> Result<String, ModelError> {
    Ok(json.to_string())
}

const THREE_SLIDES: &str = r#"[
    {"slide_number": 1, "title": "One", "content": "first", "narration": "spoken one"},
    {"slide_number": 2, "title": "Two", "content": "second", "narration": ""},
    {"slide_number": 3, "title": "Three", "content": "third"}
]"#;

fn orchestrator(client: Arc<ScriptedClient>) -> SlideOrchestrator {
    let config = SlideConfig::default();
    let ingest_config = IngestConfig {
        retry: RetryPolicy::any_failure().with_delay(Duration::ZERO),
        ..IngestConfig::from_config(&config)
    };
    let ingestor = DocumentIngestor::new(ingest_config, Arc::new(ModelSummarizer::new(client.clone())));
    SlideOrchestrator::new(client, &config)
        .with_ingestor(ingestor)
        .with_retry_policy(RetryPolicy::transient_only().with_delay(Duration::ZERO))
}

async fn generated_session(orchestrator: &SlideOrchestrator) -> SessionId {
    orchestrator
        .generate(GenerateRequest {
            prompt: "Three slides about tides".into(),
            document: None,
            theme: Some("ocean".into()),
        })
        .await
        .unwrap()
        .session_id
}

fn edit(session_id: &SessionId, prompt: &str) -> EditRequest {
    EditRequest {
        session_id: session_id.clone(),
        prompt: prompt.to_string(),
        external_deck: None,
    }
}

fn titles(deck: &SlideDeck) -> Vec<String> {
    deck.iter().map(|s| s.title.clone()).collect()
}

#[tokio::test]
async fn test_generate_opens_session_with_one_snapshot() {
    let client = ScriptedClient::new(vec![ok(THREE_SLIDES)]);
    let orchestrator = orchestrator(client.clone());

    let response = orchestrator
        .generate(GenerateRequest {
            prompt: "Three slides about tides".into(),
            document: Some("Tides rise and fall twice a day.".into()),
            theme: Some("ocean".into()),
        })
        .await
        .unwrap();

    assert!(!response.was_summarized);
    assert!(response.deck.is_contiguous());
    assert_eq!(titles(&response.deck), vec!["One", "Two", "Three"]);
    assert_eq!(response.deck.slides()[1].narration, None);

    let session = orchestrator.store().get(&response.session_id).await.unwrap();
    assert_eq!(session.history_len(), 1);
    assert_eq!(session.source_document_text, "Tides rise and fall twice a day.");

    let sent = client.slide_requests();
    assert_eq!(sent[0].purpose, RequestPurpose::Generate);
    assert!(sent[0].context.starts_with("Input Article: Tides rise"));
    assert!(sent[0].hints.as_deref().unwrap().contains("ocean"));
}

#[tokio::test]
async fn test_long_document_is_summarized_before_generation() {
    let client = ScriptedClient::new(vec![ok(THREE_SLIDES)]);
    let orchestrator = orchestrator(client.clone());
    let document = vec!["word"; 6000].join(" ");

    let response = orchestrator
        .generate(GenerateRequest {
            prompt: "Summarize".into(),
            document: Some(document),
            theme: None,
        })
        .await
        .unwrap();
    assert!(response.was_summarized);

    let session = orchestrator.store().get(&response.session_id).await.unwrap();
    let expected = vec!["condensed"; 10].join("\n\n");
    assert_eq!(session.source_document_text, expected);
}

#[tokio::test]
async fn test_malformed_response_repaired_once() {
    let client = ScriptedClient::new(vec![
        ok("Sure! Here are your slides."),
        ok(THREE_SLIDES),
    ]);
    let orchestrator = orchestrator(client.clone());

    let id = generated_session(&orchestrator).await;
    assert_eq!(orchestrator.store().current_deck(&id).await.unwrap().len(), 3);

    let sent = client.slide_requests();
    assert_eq!(sent.len(), 2);
    assert!(sent[1].instruction.starts_with("Three slides about tides"));
    assert!(sent[1].instruction.contains("could not be used"));
}

#[tokio::test]
async fn test_second_malformed_response_leaves_session_unchanged() {
    let client = ScriptedClient::new(vec![
        ok(THREE_SLIDES),
        ok("[{\"title\": \"no number\", \"content\": \"x\"}]"),
        ok("still not slides"),
    ]);
    let orchestrator = orchestrator(client);
    let id = generated_session(&orchestrator).await;

    let result = orchestrator.edit(edit(&id, "rewrite everything")).await;
    assert!(matches!(
        result,
        Err(SlideError::Generation(GenerationError::Malformed { .. }))
    ));

    let session = orchestrator.store().get(&id).await.unwrap();
    assert_eq!(session.history_len(), 1);
    assert_eq!(titles(session.current_deck()), vec!["One", "Two", "Three"]);
}

#[tokio::test]
async fn test_transient_model_failure_retried() {
    let client = ScriptedClient::new(vec![
        Err(ModelError::Http { status: 503, body: "busy".into() }),
        ok(THREE_SLIDES),
    ]);
    let orchestrator = orchestrator(client.clone());
    generated_session(&orchestrator).await;
    assert_eq!(client.slide_requests().len(), 2);
}

#[tokio::test]
async fn test_permanent_model_failure_surfaces() {
    let client = ScriptedClient::new(vec![Err(ModelError::MissingApiKey)]);
    let orchestrator = orchestrator(client);
    let result = orchestrator
        .generate(GenerateRequest {
            prompt: "anything".into(),
            document: None,
            theme: None,
        })
        .await;
    assert!(matches!(result, Err(SlideError::Model(ModelError::MissingApiKey))));
    assert!(orchestrator.sessions().await.is_empty());
}

#[tokio::test]
async fn test_edit_merges_and_undo_restores() {
    let client = ScriptedClient::new(vec![
        ok(THREE_SLIDES),
        ok(r#"[{"slide_number": -2}, {"slide_number": 1.5, "title": "Between", "content": "new"}]"#),
    ]);
    let orchestrator = orchestrator(client.clone());
    let id = generated_session(&orchestrator).await;

    let deck = orchestrator.edit(edit(&id, "drop slide two, add one after the intro")).await.unwrap();
    assert_eq!(titles(&deck), vec!["One", "Between", "Three"]);
    assert!(deck.is_contiguous());

    // Narration is kept in the store but never sent as context.
    assert_eq!(deck.slides()[0].narration.as_deref(), Some("spoken one"));
    let sent = client.slide_requests();
    assert!(!sent[1].context.contains("spoken one"));
    assert!(sent[1].context.contains("\"title\":\"Two\""));

    let undone = orchestrator.undo(&id).await.unwrap();
    assert!(undone.undone);
    assert_eq!(titles(&undone.deck), vec!["One", "Two", "Three"]);

    let again = orchestrator.undo(&id).await.unwrap();
    assert!(!again.undone);
    assert_eq!(titles(&again.deck), vec!["One", "Two", "Three"]);
}

#[tokio::test]
async fn test_external_deck_replaces_merge_base() {
    let client = ScriptedClient::new(vec![
        ok(THREE_SLIDES),
        ok(r#"[{"slide_number": 2, "title": "Revised", "content": "edited"}]"#),
    ]);
    let orchestrator = orchestrator(client.clone());
    let id = generated_session(&orchestrator).await;

    let hand_edited = SlideDeck::new(vec![
        SlideRecord::new(1.0, "Hand One", "typed in an editor"),
        SlideRecord::new(4.0, "Hand Two", "renumbered by hand"),
    ]);
    let deck = orchestrator
        .edit(EditRequest {
            session_id: id.clone(),
            prompt: "polish slide two".into(),
            external_deck: Some(hand_edited),
        })
        .await
        .unwrap();

    // Slide 2 did not exist in the hand-edited deck, so it is created
    // between 1 and 4.
    assert_eq!(titles(&deck), vec!["Hand One", "Revised", "Hand Two"]);
    assert!(client.slide_requests()[1].context.contains("Hand Two"));

    let session = orchestrator.store().get(&id).await.unwrap();
    assert_eq!(session.history_len(), 2);
    assert_eq!(orchestrator.undo(&id).await.unwrap().deck.len(), 3);
}

#[tokio::test]
async fn test_concurrent_edits_serialize() {
    let mut responses = vec![ok(THREE_SLIDES)];
    for _ in 0..5 {
        responses.push(ok(r#"[{"slide_number": 99, "title": "Added", "content": "more"}]"#));
    }
    let client = ScriptedClient::with_delay(responses, Duration::from_millis(10));
    let orchestrator = Arc::new(orchestrator(client));
    let id = generated_session(&orchestrator).await;

    let mut tasks = Vec::new();
    for n in 0..5 {
        let orchestrator = Arc::clone(&orchestrator);
        let request = edit(&id, &format!("add slide {n}"));
        tasks.push(tokio::spawn(async move { orchestrator.edit(request).await }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let session = orchestrator.store().get(&id).await.unwrap();
    assert_eq!(session.history_len(), 6);
    assert_eq!(session.current_deck().len(), 8);
    assert!(session.current_deck().is_contiguous());
}

#[tokio::test]
async fn test_export_and_session_listing() {
    let client = ScriptedClient::new(vec![ok(THREE_SLIDES)]);
    let orchestrator = orchestrator(client);
    let id = generated_session(&orchestrator).await;

    let markdown = String::from_utf8(orchestrator.export(&id).await.unwrap()).unwrap();
    assert!(markdown.starts_with("# ocean\n"));
    assert!(markdown.contains("## Slide 3: Three"));
    assert!(markdown.contains("> Notes: spoken one"));

    let sessions = orchestrator.sessions().await;
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].total_slides, 3);

    orchestrator.delete_session(&id).await.unwrap();
    assert!(matches!(
        orchestrator.export(&id).await,
        Err(SlideError::SessionNotFound(_))
    ));
    assert!(matches!(
        orchestrator.edit(edit(&id, "too late")).await,
        Err(SlideError::SessionNotFound(_))
    ));
}

#[tokio::test]
async fn test_delete_waits_for_in_flight_edit() {
    let client = ScriptedClient::with_delay(
        vec![
            ok(THREE_SLIDES),
            ok(r#"[{"slide_number": 4, "title": "Late", "content": "added"}]"#),
        ],
        Duration::from_millis(100),
    );
    let orchestrator = Arc::new(orchestrator(client));
    let id = generated_session(&orchestrator).await;

    let editing = {
        let orchestrator = Arc::clone(&orchestrator);
        let request = edit(&id, "add a closing slide");
        tokio::spawn(async move { orchestrator.edit(request).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    orchestrator.delete_session(&id).await.unwrap();
    assert!(editing.is_finished());
    let deck = editing.await.unwrap().unwrap();
    assert_eq!(deck.len(), 4);

    assert!(matches!(
        orchestrator.store().get(&id).await,
        Err(SlideError::SessionNotFound(_))
    ));
}

//! Session-level workflows: generate a deck, edit it, undo, export.

use std::sync::Arc;

use slide_common::SlideConfig;
use slide_protocol::{
    EditRequest, GenerateRequest, GenerateResponse, SessionId, SessionInfo, SlideDeck,
    SlideOperation, UndoOutcome,
};

use crate::client::{ModelClient, ModelRequest, RequestPurpose};
use crate::error::Result;
use crate::ingest::{DocumentIngestor, IngestConfig, ModelSummarizer};
use crate::merge::merge;
use crate::prompts::{render_repair_instruction, render_slide_instructions, render_theme_hint};
use crate::render::{DeckRenderer, MarkdownRenderer};
use crate::response_parser::parse_operations;
use crate::retry::{with_retry, RetryPolicy};
use crate::session_store::SessionStore;

pub struct SlideOrchestrator {
    client: Arc<dyn ModelClient>,
    ingestor: DocumentIngestor,
    store: Arc<SessionStore>,
    renderer: Arc<dyn DeckRenderer>,
    retry: RetryPolicy,
}

impl SlideOrchestrator {
    pub fn new(client: Arc<dyn ModelClient>, config: &SlideConfig) -> Self {
        let summarizer = Arc::new(ModelSummarizer::new(Arc::clone(&client)));
        Self {
            ingestor: DocumentIngestor::new(IngestConfig::from_config(config), summarizer),
            client,
            store: Arc::new(SessionStore::new()),
            renderer: Arc::new(MarkdownRenderer),
            retry: RetryPolicy::transient_only(),
        }
    }

    pub fn with_store(mut self, store: Arc<SessionStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_ingestor(mut self, ingestor: DocumentIngestor) -> Self {
        self.ingestor = ingestor;
        self
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn DeckRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn renderer(&self) -> &dyn DeckRenderer {
        self.renderer.as_ref()
    }

    /// Build a new deck from a prompt and optional source document, and open
    /// a session holding it.
    pub async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse> {
        let GenerateRequest { prompt, document, theme } = request;

        let (source_text, was_summarized) = match document.filter(|d| !d.trim().is_empty()) {
            Some(document) => {
                let report = self.ingestor.ingest(&document).await;
                (report.text, report.was_summarized)
            }
            None => (String::new(), false),
        };

        let empty = SlideDeck::empty();
        let context = render_slide_instructions(&source_text, &empty)?;
        let hints = render_theme_hint(theme.as_deref());
        let operations = self
            .request_operations(RequestPurpose::Generate, &prompt, context, hints)
            .await?;
        let deck = merge(&empty, &operations)?;

        let message = if was_summarized {
            format!("Generated {} slides from a summarized document", deck.len())
        } else {
            format!("Generated {} slides", deck.len())
        };
        let session = self.store.create(source_text, deck.clone(), theme).await;
        tracing::info!("{message} in session {}", session.id);

        Ok(GenerateResponse { session_id: session.id, deck, was_summarized, message })
    }

    /// Apply a prompt to a session's deck and commit the result.
    ///
    /// When `external_deck` is present it is merged against in place of the
    /// stored deck. The session stays locked for the whole call, so edits on
    /// one session never interleave.
    pub async fn edit(&self, request: EditRequest) -> Result<SlideDeck> {
        let EditRequest { session_id, prompt, external_deck } = request;
        let mut guard = self.store.lock(&session_id).await?;

        let base = match external_deck {
            Some(deck) => {
                tracing::info!(
                    "session {session_id}: editing on top of an externally modified deck ({} slides)",
                    deck.len()
                );
                deck
            }
            None => guard.current_deck().clone(),
        };

        let context = render_slide_instructions(&guard.source_document_text, &base)?;
        let hints = render_theme_hint(guard.theme.as_deref());
        let operations = self
            .request_operations(RequestPurpose::Edit, &prompt, context, hints)
            .await?;
        let deck = merge(&base, &operations)?;

        guard.commit(deck.clone());
        tracing::info!(
            "session {session_id}: applied {} operation(s), deck has {} slides",
            operations.len(),
            deck.len()
        );
        Ok(deck)
    }

    pub async fn undo(&self, session_id: &SessionId) -> Result<UndoOutcome> {
        self.store.undo(session_id).await
    }

    /// Render the session's current deck with the configured renderer.
    pub async fn export(&self, session_id: &SessionId) -> Result<Vec<u8>> {
        let guard = self.store.lock(session_id).await?;
        self.renderer.render(guard.current_deck(), guard.theme.as_deref())
    }

    pub async fn sessions(&self) -> Vec<SessionInfo> {
        self.store.list().await
    }

    pub async fn session_info(&self, session_id: &SessionId) -> Result<SessionInfo> {
        Ok(self.store.get(session_id).await?.info())
    }

    pub async fn delete_session(&self, session_id: &SessionId) -> Result<()> {
        self.store.delete(session_id).await
    }

    /// Ask the model for operations. An unparseable answer gets one repair
    /// request; a second bad answer is a generation error.
    async fn request_operations(
        &self,
        purpose: RequestPurpose,
        prompt: &str,
        context: String,
        hints: Option<String>,
    ) -> Result<Vec<SlideOperation>> {
        let request = ModelRequest {
            purpose,
            instruction: prompt.to_string(),
            context,
            hints,
        };

        let text = self.call_model(&request).await?;
        let first_error = match parse_operations(&text) {
            Ok(operations) => return Ok(operations),
            Err(e) => e,
        };

        let reason = first_error.to_string();
        tracing::warn!("unusable model response ({reason}); requesting a repair");
        let repair = ModelRequest {
            instruction: render_repair_instruction(prompt, &reason),
            ..request
        };
        let text = self.call_model(&repair).await?;
        Ok(parse_operations(&text)?)
    }

    async fn call_model(&self, request: &ModelRequest) -> Result<String> {
        let label = format!("{:?} request", request.purpose);
        let text = with_retry(self.retry, &label, || self.client.complete(request.clone())).await?;
        Ok(text)
    }
}

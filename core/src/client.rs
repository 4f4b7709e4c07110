use async_trait::async_trait;
use slide_common::SlideConfig;
use std::time::Duration;

use slide_chatgpt::{ChatMessage, OpenAiModelClient};

use crate::error::ModelError;

/// What a model request is for. Lets adapters pick message layout and
/// sampling settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPurpose {
    Summarize,
    Generate,
    Edit,
}

/// A single request to the text-generation collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    pub purpose: RequestPurpose,
    /// What is being asked for (the user's prompt, or the fixed
    /// summarization instruction).
    pub instruction: String,
    /// Material the instruction operates on.
    pub context: String,
    pub hints: Option<String>,
}

#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn complete(&self, request: ModelRequest) -> Result<String, ModelError>;
}

/// Offline client that answers without a network call.
///
/// Summaries echo the first words of the chunk; generation yields a three
/// slide outline of the prompt; edits append one slide carrying the request.
pub struct StubClient;

const STUB_SUMMARY_WORDS: usize = 60;

#[async_trait]
impl ModelClient for StubClient {
    async fn complete(&self, request: ModelRequest) -> Result<String, ModelError> {
        let text = match request.purpose {
            RequestPurpose::Summarize => request
                .context
                .split_whitespace()
                .take(STUB_SUMMARY_WORDS)
                .collect::<Vec<_>>()
                .join(" "),
            RequestPurpose::Generate => serde_json::json!([
                {"slide_number": 1, "title": request.instruction, "content": "Overview", "narration": ""},
                {"slide_number": 2, "title": "Key points", "content": format!("- {}", request.instruction), "narration": ""},
                {"slide_number": 3, "title": "Summary", "content": "Questions and next steps", "narration": ""},
            ])
            .to_string(),
            RequestPurpose::Edit => serde_json::json!([
                {"slide_number": 100000, "title": "Notes", "content": request.instruction, "narration": ""},
            ])
            .to_string(),
        };
        Ok(text)
    }
}

/// Adapter to wrap OpenAiModelClient into ModelClient
pub struct OpenAiAdapter {
    inner: OpenAiModelClient,
    temperature: f32,
}

impl OpenAiAdapter {
    pub fn from_config(config: &SlideConfig) -> Result<Self, ModelError> {
        let api_key = config.api_key.clone().unwrap_or_default();
        let inner = OpenAiModelClient::new_with_model(api_key, config.model.clone())
            .with_base_url(config.base_url.clone())
            .with_timeout(Duration::from_secs(config.request_timeout_secs))?;
        Ok(Self { inner, temperature: config.temperature })
    }

    fn messages(request: &ModelRequest) -> Vec<ChatMessage> {
        match request.purpose {
            RequestPurpose::Summarize => vec![
                ChatMessage::system(request.instruction.clone()),
                ChatMessage::user(format!("Article:\n{}", request.context)),
            ],
            RequestPurpose::Generate | RequestPurpose::Edit => {
                let mut system = request.context.clone();
                if let Some(hints) = &request.hints {
                    system.push_str("\n\n");
                    system.push_str(hints);
                }
                vec![
                    ChatMessage::system(system),
                    ChatMessage::user(format!("User request: {}", request.instruction)),
                ]
            }
        }
    }
}

#[async_trait]
impl ModelClient for OpenAiAdapter {
    async fn complete(&self, request: ModelRequest) -> Result<String, ModelError> {
        let temperature = match request.purpose {
            RequestPurpose::Summarize => None,
            RequestPurpose::Generate | RequestPurpose::Edit => Some(self.temperature),
        };
        let text = self.inner.chat(Self::messages(&request), temperature).await?;
        Ok(text)
    }
}

use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Error)]
pub enum ChatGptError {
    #[error("OPENAI_API_KEY is not set")]
    MissingApiKey,

    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("openai http {status}: {body}")]
    Http { status: u16, body: String },

    #[error("response contained no message content")]
    EmptyResponse,

    #[error("invalid response body: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ChatGptError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ChatGptError::Timeout
        } else {
            ChatGptError::Transport(err.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }
}

/// Minimal OpenAI Chat Completions client (non-streaming).
pub struct OpenAiModelClient {
    api_key: String,
    pub model: String,
    base_url: String,
    http: reqwest::Client,
}

impl OpenAiModelClient {
    pub fn new(api_key: String) -> Self {
        Self::new_with_model(api_key, "gpt-4o-mini".to_string())
    }

    pub fn new_with_model(api_key: String, model: String) -> Self {
        Self {
            api_key,
            model,
            base_url: DEFAULT_BASE_URL.to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Rebuild the HTTP client with a per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, ChatGptError> {
        self.http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(self)
    }

    /// Send one chat completion request and return the assistant text.
    pub async fn chat(
        &self,
        messages: Vec<ChatMessage>,
        temperature: Option<f32>,
    ) -> Result<String, ChatGptError> {
        if self.api_key.is_empty() {
            return Err(ChatGptError::MissingApiKey);
        }

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
        });
        if let Some(t) = temperature {
            body["temperature"] = serde_json::json!(t);
        }
        tracing::debug!(model = %self.model, messages = messages.len(), "chat completion request");

        let mut req = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json");
        if let Ok(project) = std::env::var("OPENAI_PROJECT") {
            if !project.is_empty() {
                req = req.header("OpenAI-Project", project);
            }
        }
        if let Ok(org) = std::env::var("OPENAI_ORG") {
            if !org.is_empty() {
                req = req.header("OpenAI-Organization", org);
            }
        }

        let resp = req.json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "openai request failed");
            return Err(ChatGptError::Http { status: status.as_u16(), body: text });
        }

        let value: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| ChatGptError::Decode(e.to_string()))?;
        extract_message_content(&value)
    }
}

/// Pull `choices[0].message.content` out of a chat completion body.
pub fn extract_message_content(value: &serde_json::Value) -> Result<String, ChatGptError> {
    match value["choices"][0]["message"]["content"].as_str() {
        Some(text) if !text.trim().is_empty() => Ok(text.to_string()),
        _ => Err(ChatGptError::EmptyResponse),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_first_choice_content() {
        let body = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "[{\"slide_number\": 1}]"}}]
        });
        assert_eq!(extract_message_content(&body).unwrap(), "[{\"slide_number\": 1}]");
    }

    #[test]
    fn blank_content_is_empty_response() {
        let body = serde_json::json!({"choices": [{"message": {"content": "  "}}]});
        assert!(matches!(extract_message_content(&body), Err(ChatGptError::EmptyResponse)));
        assert!(matches!(
            extract_message_content(&serde_json::json!({})),
            Err(ChatGptError::EmptyResponse)
        ));
    }

    #[tokio::test]
    async fn empty_key_fails_before_network() {
        let client = OpenAiModelClient::new(String::new());
        let err = client.chat(vec![ChatMessage::user("hi")], None).await.unwrap_err();
        assert!(matches!(err, ChatGptError::MissingApiKey));
    }
}

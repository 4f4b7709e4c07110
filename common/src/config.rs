use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Documents at or below this many words are used verbatim.
pub const DEFAULT_SUMMARIZATION_THRESHOLD: usize = 5000;
pub const DEFAULT_CHUNK_COUNT: usize = 10;
pub const DEFAULT_SUMMARY_WORKERS: usize = 4;
pub const DEFAULT_SESSION_TTL_SECS: u64 = 3600;

/// Slide configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlideConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub request_timeout_secs: u64,
    pub summarization_threshold: usize,
    pub chunk_count: usize,
    pub summary_workers: usize,
    pub session_ttl_secs: u64,
    pub state_dir: PathBuf,
}

impl Default for SlideConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            temperature: 0.9,
            request_timeout_secs: 120,
            summarization_threshold: DEFAULT_SUMMARIZATION_THRESHOLD,
            chunk_count: DEFAULT_CHUNK_COUNT,
            summary_workers: DEFAULT_SUMMARY_WORKERS,
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
            state_dir: PathBuf::from("slides").join("sessions"),
        }
    }
}

impl SlideConfig {
    /// Get config file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Cannot find config directory"))?
            .join("slide");

        std::fs::create_dir_all(&config_dir)?;
        Ok(config_dir.join("config.json"))
    }

    /// Load configuration from the default location, then apply environment
    /// overrides.
    pub async fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = Self::load_from(&path).await?;
        config.apply_env();
        Ok(config)
    }

    /// Load configuration from `path`, falling back to defaults when the
    /// file does not exist.
    pub async fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: SlideConfig = serde_json::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from a variable lookup. Unparseable numeric values are
    /// ignored.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("OPENAI_API_KEY").filter(|k| !k.is_empty()) {
            self.api_key = Some(key);
        }
        if let Some(model) = lookup("SLIDE_MODEL").filter(|m| !m.is_empty()) {
            self.model = model;
        }
        if let Some(url) = lookup("SLIDE_BASE_URL").filter(|u| !u.is_empty()) {
            self.base_url = url;
        }
        if let Some(ttl) = lookup("SLIDE_SESSION_TTL").and_then(|v| v.parse().ok()) {
            self.session_ttl_secs = ttl;
        }
        if let Some(dir) = lookup("SLIDE_STATE_DIR").filter(|d| !d.is_empty()) {
            self.state_dir = PathBuf::from(dir);
        }
    }
}

use slide_protocol::SessionId;
use thiserror::Error;

/// Core error types for the slide engine
#[derive(Error, Debug)]
pub enum SlideError {
    #[error("Ingest error: {0}")]
    Ingest(#[from] IngestError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Merge error: {0}")]
    Merge(#[from] MergeError),

    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("Render error: {0}")]
    Render(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SlideError {
    /// Stable, machine-readable name of the failure kind.
    pub fn kind(&self) -> &'static str {
        match self {
            SlideError::Ingest(_) => "ingest",
            SlideError::Model(_) => "model",
            SlideError::Generation(_) => "generation",
            SlideError::Merge(_) => "merge",
            SlideError::SessionNotFound(_) => "session_not_found",
            SlideError::Snapshot(_) => "snapshot",
            SlideError::Render(_) => "render",
            SlideError::Io(_) => "io",
            SlideError::Json(_) => "json",
        }
    }
}

/// Source documents that cannot be turned into text.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Unsupported source format: {extension}")]
    UnsupportedFormat { extension: String },

    #[error("Unreadable source {path}: {reason}")]
    Unreadable { path: String, reason: String },
}

/// Failures talking to the text-generation model.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("API key is not configured")]
    MissingApiKey,

    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Model request timed out")]
    Timeout,

    #[error("Model returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Model returned an empty response")]
    EmptyResponse,
}

impl ModelError {
    /// Whether one more attempt may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ModelError::Transport(_) | ModelError::Timeout | ModelError::EmptyResponse => true,
            ModelError::Http { status, .. } => *status == 429 || *status >= 500,
            ModelError::MissingApiKey => false,
        }
    }
}

impl From<slide_chatgpt::ChatGptError> for ModelError {
    fn from(err: slide_chatgpt::ChatGptError) -> Self {
        use slide_chatgpt::ChatGptError;
        match err {
            ChatGptError::MissingApiKey => ModelError::MissingApiKey,
            ChatGptError::Timeout => ModelError::Timeout,
            ChatGptError::Transport(reason) | ChatGptError::Decode(reason) => {
                ModelError::Transport(reason)
            }
            ChatGptError::Http { status, body } => ModelError::Http { status, body },
            ChatGptError::EmptyResponse => ModelError::EmptyResponse,
        }
    }
}

/// Model output that does not describe slide operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    #[error("Malformed slide data: {reason}")]
    Malformed { reason: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MergeError {
    #[error("{source_kind} carries a non-finite slide number ({value})")]
    InvalidNumber { source_kind: &'static str, value: f64 },
}

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Unsupported snapshot format version {found}")]
    UnsupportedVersion { found: u32 },

    #[error("Snapshot for session {0} has an empty history")]
    EmptyHistory(SessionId),

    #[error("Session id {0} cannot be used as a snapshot file name")]
    InvalidSessionId(SessionId),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, SlideError>;

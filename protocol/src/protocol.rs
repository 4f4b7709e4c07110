use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::SlideDeck;

/// Version written into every [`SessionSnapshot`].
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
    #[serde(default)]
    pub document: Option<String>,
    #[serde(default)]
    pub theme: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub session_id: SessionId,
    pub deck: SlideDeck,
    pub was_summarized: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditRequest {
    pub session_id: SessionId,
    pub prompt: String,
    /// Deck read back from a hand-edited artifact. When present it replaces
    /// the stored deck as the merge base.
    #[serde(default)]
    pub external_deck: Option<SlideDeck>,
}

/// Result of an undo. `undone == false` means the history held a single
/// snapshot and nothing changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UndoOutcome {
    pub deck: SlideDeck,
    pub undone: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: SessionId,
    pub total_slides: usize,
    pub history_len: usize,
    pub created_at: DateTime<Utc>,
    pub has_source_document: bool,
}

/// Text produced by ingestion plus how it was obtained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub text: String,
    /// Word count of the source before any summarization.
    pub word_count: usize,
    pub was_summarized: bool,
    /// Chunks whose summary failed twice and were kept verbatim.
    pub degraded_chunks: usize,
}

/// Stable on-disk form of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub format_version: u32,
    pub session_id: SessionId,
    #[serde(default)]
    pub source_document_text: String,
    #[serde(default)]
    pub theme: Option<String>,
    pub history: Vec<SlideDeck>,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SlideRecord;

    #[test]
    fn session_ids_are_unique_and_transparent() {
        let a = SessionId::new();
        let b = SessionId::new();
        assert_ne!(a, b);

        let json = serde_json::to_string(&a).unwrap();
        assert_eq!(json, format!("\"{a}\""));
    }

    #[test]
    fn snapshot_keeps_history_order() {
        let now = Utc::now();
        let snapshot = SessionSnapshot {
            format_version: SNAPSHOT_FORMAT_VERSION,
            session_id: SessionId::from("s1"),
            source_document_text: "doc".into(),
            theme: Some("ocean".into()),
            history: vec![
                SlideDeck::new(vec![SlideRecord::new(1.0, "first", "")]),
                SlideDeck::new(vec![SlideRecord::new(1.0, "second", "")]),
            ],
            created_at: now,
            last_accessed: now,
        };
        let json = serde_json::to_string(&snapshot).unwrap();
        let back: SessionSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back.history[1].slides()[0].title, "second");
        assert_eq!(back, snapshot);
    }

    #[test]
    fn edit_request_external_deck_is_optional() {
        let req: EditRequest =
            serde_json::from_str(r#"{"session_id": "abc", "prompt": "shorter"}"#).unwrap();
        assert_eq!(req.session_id.as_str(), "abc");
        assert!(req.external_deck.is_none());
    }
}

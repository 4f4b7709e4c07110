//! Slide deck engine: document ingestion, operation merging, session
//! history and the generate/edit/undo/export workflows built on them.

pub mod client;
pub mod error;
pub mod ingest;
pub mod merge;
pub mod orchestrator;
pub mod prompts;
pub mod render;
pub mod response_parser;
pub mod retry;
pub mod session_store;

pub use client::{ModelClient, ModelRequest, OpenAiAdapter, RequestPurpose, StubClient};
pub use error::{Result, SlideError};
pub use ingest::{DocumentIngestor, IngestConfig, ModelSummarizer, Summarizer};
pub use merge::{merge, renumber};
pub use orchestrator::SlideOrchestrator;
pub use render::{DeckRenderer, MarkdownRenderer};
pub use retry::RetryPolicy;
pub use session_store::{Session, SessionGuard, SessionStore};

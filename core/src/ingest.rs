//! Source document ingestion: long documents are split into chunks that are
//! summarized in parallel and stitched back together in order.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use slide_common::{word_count, word_spans, SlideConfig};
use slide_protocol::{DocumentChunk, IngestReport};
use tokio::sync::mpsc;

use crate::client::{ModelClient, ModelRequest, RequestPurpose};
use crate::error::{IngestError, ModelError};
use crate::prompts::SUMMARIZE_INSTRUCTION;
use crate::retry::{with_retry, RetryPolicy};

const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "markdown"];
const PARAGRAPH_BREAK: &str = "\n\n";

#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, text: &str) -> Result<String, ModelError>;
}

/// Summarizer backed by the generation model.
pub struct ModelSummarizer {
    client: Arc<dyn ModelClient>,
}

impl ModelSummarizer {
    pub fn new(client: Arc<dyn ModelClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Summarizer for ModelSummarizer {
    async fn summarize(&self, text: &str) -> Result<String, ModelError> {
        let summary = self
            .client
            .complete(ModelRequest {
                purpose: RequestPurpose::Summarize,
                instruction: SUMMARIZE_INSTRUCTION.to_string(),
                context: text.to_string(),
                hints: None,
            })
            .await?;
        tracing::debug!("summarized {} words into {} chars", word_count(text), summary.len());
        Ok(summary)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct IngestConfig {
    /// Documents with at most this many words pass through untouched.
    pub threshold: usize,
    pub chunk_count: usize,
    pub workers: usize,
    pub retry: RetryPolicy,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self::from_config(&SlideConfig::default())
    }
}

impl IngestConfig {
    pub fn from_config(config: &SlideConfig) -> Self {
        Self {
            threshold: config.summarization_threshold,
            chunk_count: config.chunk_count.max(1),
            workers: config.summary_workers.max(1),
            retry: RetryPolicy::any_failure(),
        }
    }
}

/// Split `text` into at most `chunk_count` chunks of `total / chunk_count`
/// words each, cutting only between words. The last chunk takes the
/// remainder.
pub fn split_into_chunks(text: &str, chunk_count: usize) -> Vec<DocumentChunk> {
    let spans = word_spans(text);
    if spans.is_empty() {
        return Vec::new();
    }
    let count = chunk_count.clamp(1, spans.len());
    let per_chunk = spans.len() / count;

    (0..count)
        .map(|index| {
            let first = index * per_chunk;
            let end_word = if index + 1 == count { spans.len() } else { first + per_chunk };
            let start = spans[first].0;
            let end = spans[end_word - 1].1;
            DocumentChunk {
                index,
                text: text[start..end].to_string(),
                word_count: end_word - first,
            }
        })
        .collect()
}

struct ChunkOutcome {
    index: usize,
    text: String,
    degraded: bool,
}

#[derive(Clone)]
pub struct DocumentIngestor {
    config: IngestConfig,
    summarizer: Arc<dyn Summarizer>,
}

impl DocumentIngestor {
    pub fn new(config: IngestConfig, summarizer: Arc<dyn Summarizer>) -> Self {
        Self { config, summarizer }
    }

    /// Return `text` unchanged when short enough, otherwise a chunk-by-chunk
    /// summary. Never fails: chunks that cannot be summarized are kept as-is.
    pub async fn ingest(&self, text: &str) -> IngestReport {
        let words = word_count(text);
        if words <= self.config.threshold {
            return IngestReport {
                text: text.to_string(),
                word_count: words,
                was_summarized: false,
                degraded_chunks: 0,
            };
        }

        let chunks = split_into_chunks(text, self.config.chunk_count);
        tracing::info!(
            "document has {words} words (threshold {}); summarizing {} chunks",
            self.config.threshold,
            chunks.len()
        );
        let (parts, degraded_chunks) = self.summarize_chunks(chunks).await;
        if degraded_chunks > 0 {
            tracing::warn!("{degraded_chunks} chunk(s) kept verbatim after summarization failures");
        }

        IngestReport {
            text: parts.join(PARAGRAPH_BREAK),
            word_count: words,
            was_summarized: true,
            degraded_chunks,
        }
    }

    /// Summarize chunks on a fixed pool of workers and return the results in
    /// chunk order along with the number of degraded chunks.
    async fn summarize_chunks(&self, chunks: Vec<DocumentChunk>) -> (Vec<String>, usize) {
        let total = chunks.len();
        if total == 0 {
            return (Vec::new(), 0);
        }
        let workers = self.config.workers.clamp(1, total);
        let originals: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();

        let (job_tx, job_rx) = async_channel::bounded::<DocumentChunk>(workers);
        let (result_tx, mut result_rx) = mpsc::channel::<ChunkOutcome>(total);

        let mut handles = Vec::with_capacity(workers);
        for worker in 0..workers {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            let summarizer = Arc::clone(&self.summarizer);
            let policy = self.config.retry;
            handles.push(tokio::spawn(async move {
                while let Ok(chunk) = job_rx.recv().await {
                    tracing::debug!("worker {worker} summarizing chunk {}", chunk.index);
                    let outcome = summarize_chunk(summarizer.as_ref(), policy, chunk).await;
                    if result_tx.send(outcome).await.is_err() {
                        break;
                    }
                }
            }));
        }
        drop(job_rx);
        drop(result_tx);

        for chunk in chunks {
            if job_tx.send(chunk).await.is_err() {
                tracing::warn!("all summary workers stopped before the queue drained");
                break;
            }
        }
        job_tx.close();

        let mut slots: Vec<Option<String>> = vec![None; total];
        let mut degraded = 0;
        while let Some(outcome) = result_rx.recv().await {
            if outcome.degraded {
                degraded += 1;
            }
            if let Some(slot) = slots.get_mut(outcome.index) {
                *slot = Some(outcome.text);
            }
        }

        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                tracing::warn!("summary worker ended abnormally: {e}");
            }
        }

        let mut parts = Vec::with_capacity(total);
        for (index, (slot, original)) in slots.into_iter().zip(originals).enumerate() {
            match slot {
                Some(text) => parts.push(text),
                None => {
                    tracing::warn!("chunk {index} was never summarized; keeping original text");
                    degraded += 1;
                    parts.push(original);
                }
            }
        }
        (parts, degraded)
    }
}

async fn summarize_chunk(summarizer: &dyn Summarizer, policy: RetryPolicy, chunk: DocumentChunk) -> ChunkOutcome {
    let label = format!("summary of chunk {}", chunk.index);
    let result = with_retry(policy, &label, || summarizer.summarize(&chunk.text)).await;
    match result {
        Ok(text) => ChunkOutcome { index: chunk.index, text, degraded: false },
        Err(err) => {
            tracing::warn!(
                "chunk {} ({} words) kept verbatim: {err}",
                chunk.index,
                chunk.word_count
            );
            ChunkOutcome { index: chunk.index, text: chunk.text, degraded: true }
        }
    }
}

/// Read a plain-text source document. Extraction from office or PDF formats
/// happens upstream; those extensions are rejected here.
pub async fn load_source_text(path: &Path) -> Result<String, IngestError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if !TEXT_EXTENSIONS.contains(&extension.as_str()) {
        let extension = if extension.is_empty() { "(none)".to_string() } else { extension };
        return Err(IngestError::UnsupportedFormat { extension });
    }

    let bytes = tokio::fs::read(path).await.map_err(|e| IngestError::Unreadable {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    String::from_utf8(bytes).map_err(|_| IngestError::Unreadable {
        path: path.display().to_string(),
        reason: "not valid UTF-8".to_string(),
    })
}

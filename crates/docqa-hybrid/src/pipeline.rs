//! Ingest-then-ask orchestration.
//!
//! Documents are chunked and indexed once; every question then retrieves the
//! top chunks (vector only, or vector + keyword fused) and hands them to an
//! [`AnswerGenerator`] together with the deduplicated `(document, page)`
//! citations.

use anyhow::Result;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::info;

use docqa_core::chunker::{Chunker, ChunkingConfig};
use docqa_core::config::{AppConfig, SearchConfig};
use docqa_core::error::Error;
use docqa_core::traits::Retriever;
use docqa_core::types::{Document, RankedChunk, SearchMethod, SourceRef};

use crate::engine::HybridSearchEngine;
use crate::fusion::FusionConfig;

/// Produces the final answer from a question and its retrieved passages.
pub trait AnswerGenerator: Send + Sync {
    fn generate(&self, question: &str, context: &[RankedChunk]) -> Result<String>;
}

/// Numbered, cited context passages: `[i] Source: <source>, Page: <page>`.
pub fn build_context(chunks: &[RankedChunk]) -> String {
    chunks
        .iter()
        .enumerate()
        .map(|(i, c)| format!("[{}] Source: {}, Page: {}\n{}\n", i + 1, c.chunk.source, c.chunk.page, c.chunk.text))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Prompt for a text-generation service answering from `context`.
pub fn build_prompt(question: &str, context: &str) -> String {
    format!(
        "Context:\n{context}\n\nQuestion: {question}\n\nAnswer based on the context above. Cite sources with document name and page number."
    )
}

/// Offline generator: answers with the cited passages themselves.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContextAnswerer;

impl AnswerGenerator for ContextAnswerer {
    fn generate(&self, question: &str, context: &[RankedChunk]) -> Result<String> {
        if context.is_empty() {
            return Ok(format!("No passages matched \"{question}\"."));
        }
        Ok(format!("Passages relevant to \"{question}\":\n\n{}", build_context(context)))
    }
}

/// Unique `(document, page)` pairs in rank order.
pub fn unique_sources(chunks: &[RankedChunk]) -> Vec<SourceRef> {
    let mut seen = HashSet::new();
    chunks
        .iter()
        .map(|c| SourceRef { document: c.chunk.source.clone(), page: c.chunk.page })
        .filter(|s| seen.insert(s.clone()))
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineConfig {
    pub chunking: ChunkingConfig,
    pub search: SearchConfig,
}

impl From<&AppConfig> for PipelineConfig {
    fn from(settings: &AppConfig) -> Self {
        Self { chunking: settings.chunking.clone(), search: settings.search.clone() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub documents: usize,
    pub chunks: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub answer: String,
    pub sources: Vec<SourceRef>,
    pub search_method: SearchMethod,
    pub retrieved_chunks: Vec<RankedChunk>,
}

pub struct Pipeline {
    chunker: Chunker,
    method: SearchMethod,
    retriever: Arc<dyn Retriever>,
    /// Set in hybrid mode; queries go through its time-bounded concurrent path.
    hybrid: Option<Arc<HybridSearchEngine>>,
    runtime: Option<Runtime>,
    generator: Arc<dyn AnswerGenerator>,
    /// Whether the last ingestion completed. Held for writing while
    /// re-ingesting so no query sees one adapter rebuilt and the other not.
    gate: RwLock<bool>,
}

impl Pipeline {
    /// Hybrid search needs `keyword`; vector search ignores it.
    ///
    /// A hybrid pipeline owns a small tokio runtime and must not be queried
    /// from inside another runtime's async context.
    pub fn new(
        config: PipelineConfig,
        vector: Arc<dyn Retriever>,
        keyword: Option<Arc<dyn Retriever>>,
        generator: Arc<dyn AnswerGenerator>,
    ) -> Result<Self> {
        config.search.validate()?;
        let chunker = Chunker::new(config.chunking)?;
        let method = config.search.method;
        let (retriever, hybrid, runtime): (Arc<dyn Retriever>, _, _) = match (method, keyword) {
            (SearchMethod::Vector, _) => (vector, None, None),
            (SearchMethod::Hybrid, Some(keyword)) => {
                let fusion = FusionConfig::try_from(&config.search)?;
                let engine = Arc::new(
                    HybridSearchEngine::new(vector, keyword, fusion)
                        .with_adapter_timeout(Duration::from_millis(config.search.adapter_timeout_ms)),
                );
                let runtime = tokio::runtime::Builder::new_current_thread().enable_time().build()?;
                (engine.clone() as Arc<dyn Retriever>, Some(engine), Some(runtime))
            }
            (SearchMethod::Hybrid, None) => {
                return Err(Error::InvalidConfig("hybrid search needs a keyword retriever".into()).into())
            }
        };
        info!("Pipeline initialized ({method} search)");
        Ok(Self { chunker, method, retriever, hybrid, runtime, generator, gate: RwLock::new(true) })
    }

    pub fn search_method(&self) -> SearchMethod {
        self.method
    }

    pub fn is_ready(&self) -> bool {
        self.gate.read().map(|ok| *ok).unwrap_or(false) && self.retriever.is_ready()
    }

    pub fn ingest(&self, documents: &[Document]) -> Result<IngestReport> {
        if documents.is_empty() {
            return Err(Error::NotFound("no documents to ingest".into()).into());
        }
        let chunks = self.chunker.chunk_documents(documents)?;
        let mut complete = self.gate.write().map_err(|_| lock_poisoned())?;
        *complete = false;
        self.retriever.index(&chunks)?;
        *complete = true;
        let report = IngestReport { documents: documents.len(), chunks: chunks.len() };
        info!("Ingestion complete: {} documents, {} chunks", report.documents, report.chunks);
        Ok(report)
    }

    pub fn query(&self, question: &str, top_k: usize) -> Result<QueryResponse> {
        let complete = self.gate.read().map_err(|_| lock_poisoned())?;
        if !*complete {
            return Err(Error::NotReady("the last ingestion failed; ingest documents again".into()).into());
        }
        if !self.retriever.is_ready() {
            return Err(Error::NotReady("ingest documents before querying".into()).into());
        }
        let retrieved_chunks = match (&self.hybrid, &self.runtime) {
            (Some(engine), Some(runtime)) => runtime.block_on(engine.search_concurrent(question, top_k))?,
            _ => self.retriever.search(question, top_k)?,
        };
        info!("Retrieved {} chunks ({} search)", retrieved_chunks.len(), self.method);
        let answer = self.generator.generate(question, &retrieved_chunks)?;
        Ok(QueryResponse {
            answer,
            sources: unique_sources(&retrieved_chunks),
            search_method: self.method,
            retrieved_chunks,
        })
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        // Adapter calls abandoned after a timeout may still be running.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

fn lock_poisoned() -> Error {
    Error::Operation("pipeline lock poisoned".into())
}

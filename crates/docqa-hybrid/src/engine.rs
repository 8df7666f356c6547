//! Hybrid retrieval over a vector and a keyword adapter.
//!
//! Both adapters are asked for twice the requested results and their rankings
//! are fused with [`reciprocal_rank_fusion`](crate::fusion::reciprocal_rank_fusion).
//! An adapter that errors or misses its deadline contributes an empty list
//! instead of failing the query.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use docqa_core::error::Error;
use docqa_core::traits::Retriever;
use docqa_core::types::{Chunk, RankedChunk};

use crate::fusion::{reciprocal_rank_fusion, FusionConfig};

pub const DEFAULT_ADAPTER_TIMEOUT: Duration = Duration::from_secs(10);

/// Vector + keyword retrieval fused with [`reciprocal_rank_fusion`].
///
/// Each adapter is asked for `2 * top_k` candidates. A failing or not-yet-built
/// adapter degrades to an empty list; only when neither adapter holds an index
/// does a search fail with [`Error::NotReady`].
pub struct HybridSearchEngine {
    vector: Arc<dyn Retriever>,
    keyword: Arc<dyn Retriever>,
    fusion: FusionConfig,
    adapter_timeout: Duration,
}

impl HybridSearchEngine {
    pub fn new(vector: Arc<dyn Retriever>, keyword: Arc<dyn Retriever>, fusion: FusionConfig) -> Self {
        Self { vector, keyword, fusion, adapter_timeout: DEFAULT_ADAPTER_TIMEOUT }
    }

    pub fn with_adapter_timeout(mut self, timeout: Duration) -> Self {
        self.adapter_timeout = timeout;
        self
    }

    pub fn fusion(&self) -> &FusionConfig {
        &self.fusion
    }

    pub fn index(&self, chunks: &[Chunk]) -> Result<()> {
        self.vector.index(chunks)?;
        self.keyword.index(chunks)
    }

    pub fn is_ready(&self) -> bool {
        self.vector.is_ready() || self.keyword.is_ready()
    }

    fn check_ready(&self) -> Result<()> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(Error::NotReady("no retrieval index has been built".into()).into())
        }
    }

    /// Query both adapters one after the other and fuse the results.
    pub fn search(&self, query: &str, top_k: usize) -> Result<Vec<RankedChunk>> {
        self.check_ready()?;
        if top_k == 0 {
            return Ok(vec![]);
        }
        let fetch = top_k.saturating_mul(2);
        let vector = degrade("vector", self.vector.search(query, fetch));
        let keyword = degrade("keyword", self.keyword.search(query, fetch));
        Ok(self.fuse(vector, keyword, top_k))
    }

    /// Like [`search`](Self::search), but both adapters run at the same time on
    /// blocking tasks, each bounded by the adapter timeout.
    pub async fn search_concurrent(&self, query: &str, top_k: usize) -> Result<Vec<RankedChunk>> {
        self.check_ready()?;
        if top_k == 0 {
            return Ok(vec![]);
        }
        let fetch = top_k.saturating_mul(2);
        let (vector, keyword) = tokio::join!(
            run_bounded(self.vector.clone(), query.to_string(), fetch, self.adapter_timeout),
            run_bounded(self.keyword.clone(), query.to_string(), fetch, self.adapter_timeout),
        );
        Ok(self.fuse(degrade("vector", vector), degrade("keyword", keyword), top_k))
    }

    fn fuse(&self, vector: Vec<RankedChunk>, keyword: Vec<RankedChunk>, top_k: usize) -> Vec<RankedChunk> {
        let fused = reciprocal_rank_fusion(&vector, &keyword, top_k, &self.fusion);
        debug!(vector = vector.len(), keyword = keyword.len(), fused = fused.len(), "hybrid fusion");
        fused
    }
}

async fn run_bounded(retriever: Arc<dyn Retriever>, query: String, k: usize, timeout: Duration) -> Result<Vec<RankedChunk>> {
    let task = tokio::task::spawn_blocking(move || retriever.search(&query, k));
    match tokio::time::timeout(timeout, task).await {
        Ok(joined) => joined?,
        Err(_) => Err(Error::Operation(format!("retrieval timed out after {timeout:?}")).into()),
    }
}

fn degrade(adapter: &str, result: Result<Vec<RankedChunk>>) -> Vec<RankedChunk> {
    match result {
        Ok(hits) => hits,
        Err(e) => {
            warn!("{adapter} retrieval unavailable, fusing without it: {e:#}");
            vec![]
        }
    }
}

impl Retriever for HybridSearchEngine {
    fn index(&self, chunks: &[Chunk]) -> Result<()> {
        Self::index(self, chunks)
    }

    fn search(&self, query: &str, k: usize) -> Result<Vec<RankedChunk>> {
        Self::search(self, query, k)
    }

    fn is_ready(&self) -> bool {
        Self::is_ready(self)
    }
}

use anyhow::{ensure, Result};
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, info};

use docqa_core::error::Error;
use docqa_core::traits::{Embedder, Retriever};
use docqa_core::types::{Chunk, RankedChunk, SourceKind};

use crate::cache::EmbeddingCache;
use crate::embed::embed_chunks;

struct FlatState {
    chunks: Vec<Chunk>,
    vectors: Vec<Vec<f32>>,
}

/// Exact nearest-neighbour index over chunk embeddings.
///
/// Scores are squared L2 distances, so lower is better and results come back
/// in ascending distance order; equal distances keep indexing order.
pub struct FlatIndex {
    embedder: Arc<dyn Embedder>,
    batch_size: usize,
    cache: Mutex<EmbeddingCache>,
    state: RwLock<Option<FlatState>>,
}

impl FlatIndex {
    pub fn new(embedder: Arc<dyn Embedder>, batch_size: usize) -> Self {
        let cache = Mutex::new(EmbeddingCache::new(embedder.id()));
        Self { embedder, batch_size, cache, state: RwLock::new(None) }
    }

    pub fn len(&self) -> usize {
        self.state.read().ok().and_then(|g| g.as_ref().map(|s| s.chunks.len())).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn cached_embeddings(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }
}

fn lock_poisoned() -> Error {
    Error::Operation("vector index lock poisoned".into())
}

pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

impl Retriever for FlatIndex {
    fn index(&self, chunks: &[Chunk]) -> Result<()> {
        info!("Indexing {} chunks into the vector index", chunks.len());
        let vectors = {
            let mut cache = self.cache.lock().map_err(|_| lock_poisoned())?;
            embed_chunks(self.embedder.as_ref(), &mut cache, self.batch_size, chunks)?
        };
        let mut guard = self.state.write().map_err(|_| lock_poisoned())?;
        *guard = Some(FlatState { chunks: chunks.to_vec(), vectors });
        info!("Indexed {} vectors", chunks.len());
        Ok(())
    }

    fn search(&self, query: &str, k: usize) -> Result<Vec<RankedChunk>> {
        let guard = self.state.read().map_err(|_| lock_poisoned())?;
        let state = guard.as_ref().ok_or_else(|| Error::NotReady("vector index has not been built".into()))?;
        if k == 0 || state.chunks.is_empty() { return Ok(vec![]); }

        let q = self.embedder.embed_batch(&[query.to_string()])?.pop().unwrap_or_default();
        ensure!(q.len() == self.embedder.dim(), "query embedding has dim {} expected {}", q.len(), self.embedder.dim());

        let mut scored: Vec<(usize, f32)> = state.vectors.iter().map(|v| squared_l2(&q, v)).enumerate().collect();
        scored.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);
        debug!(query, hits = scored.len(), "vector search");
        Ok(scored
            .into_iter()
            .map(|(i, d)| RankedChunk::new(state.chunks[i].clone(), d, SourceKind::Vector))
            .collect())
    }

    fn is_ready(&self) -> bool {
        self.state.read().map(|g| g.is_some()).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Embeds text as `[len, vowels]` and counts how many texts it embedded.
    struct CountingEmbedder {
        calls: AtomicUsize,
    }

    impl Embedder for CountingEmbedder {
        fn id(&self) -> &str { "counting:d2" }
        fn dim(&self) -> usize { 2 }
        fn max_len(&self) -> usize { 512 }
        fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(texts.len(), Ordering::SeqCst);
            Ok(texts
                .iter()
                .map(|t| vec![t.len() as f32, t.chars().filter(|c| "aeiou".contains(*c)).count() as f32])
                .collect())
        }
    }

    fn chunk(id: u32, text: &str) -> Chunk {
        Chunk { text: text.to_string(), source: "doc.txt".to_string(), page: 1, chunk_id: id }
    }

    fn index_with(texts: &[&str]) -> (Arc<CountingEmbedder>, FlatIndex) {
        let embedder = Arc::new(CountingEmbedder { calls: AtomicUsize::new(0) });
        let idx = FlatIndex::new(embedder.clone(), 2);
        let chunks: Vec<Chunk> = texts.iter().enumerate().map(|(i, t)| chunk(i as u32, t)).collect();
        idx.index(&chunks).unwrap();
        (embedder, idx)
    }

    #[test]
    fn search_before_index_is_not_ready() {
        let idx = FlatIndex::new(Arc::new(CountingEmbedder { calls: AtomicUsize::new(0) }), 4);
        assert!(!idx.is_ready());
        assert!(Error::is_not_ready(&idx.search("q", 3).unwrap_err()));
    }

    #[test]
    fn results_ascend_by_distance_and_respect_k() {
        let (_, idx) = index_with(&["bbbb", "bb", "bbbbbbbb", "b"]);
        let hits = idx.search("bbb", 3).unwrap();
        assert_eq!(hits.len(), 3);
        for pair in hits.windows(2) { assert!(pair[0].score <= pair[1].score); }
        // "bbbb" and "bb" are both at distance 1; indexing order breaks the tie.
        assert_eq!(hits[0].chunk.chunk_id, 0);
        assert_eq!(hits[1].chunk.chunk_id, 1);
        assert!(hits.iter().all(|h| h.kind == SourceKind::Vector));
    }

    #[test]
    fn k_larger_than_index_returns_everything() {
        let (_, idx) = index_with(&["one", "two"]);
        assert_eq!(idx.search("x", 10).unwrap().len(), 2);
        assert!(idx.search("x", 0).unwrap().is_empty());
    }

    #[test]
    fn reindexing_reuses_cached_embeddings() {
        let (embedder, idx) = index_with(&["alpha", "beta", "alpha"]);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 2, "duplicate text embedded once");
        idx.index(&[chunk(0, "alpha"), chunk(1, "gamma")]).unwrap();
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 3, "only 'gamma' is new");
        assert_eq!(idx.cached_embeddings(), 2, "'beta' was evicted");
        assert_eq!(idx.len(), 2);
    }

    #[test]
    fn empty_index_is_ready_but_returns_nothing() {
        let (_, idx) = index_with(&[]);
        assert!(idx.is_ready());
        assert!(idx.is_empty());
        assert!(idx.search("anything", 5).unwrap().is_empty());
    }
}

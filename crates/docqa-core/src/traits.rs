use crate::types::{Chunk, RankedChunk};

pub trait Embedder: Send + Sync {
    /// Stable identifier for the model (used to key embedding caches).
    fn id(&self) -> &str;
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// A retrieval backend the fusion engine can rank against.
///
/// `index` replaces whatever the backend held before. `search` returns at most
/// `k` hits in the backend's native best-first order and fails with
/// [`crate::error::Error::NotReady`] when nothing has been indexed yet.
pub trait Retriever: Send + Sync {
    fn index(&self, chunks: &[Chunk]) -> anyhow::Result<()>;
    fn search(&self, query: &str, k: usize) -> anyhow::Result<Vec<RankedChunk>>;
    fn is_ready(&self) -> bool;
}

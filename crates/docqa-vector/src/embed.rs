use anyhow::{anyhow, ensure, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashSet;
use tracing::{debug, info};

use docqa_core::traits::Embedder;
use docqa_core::types::Chunk;

use crate::cache::{hash_content, EmbeddingCache};

/// Embed every chunk text, reusing cached vectors and writing misses back.
///
/// Returns one vector per chunk, in chunk order, each of `embedder.dim()`
/// components. The cache ends up holding exactly the vectors of `chunks`.
pub fn embed_chunks(
    embedder: &dyn Embedder,
    cache: &mut EmbeddingCache,
    batch_size: usize,
    chunks: &[Chunk],
) -> Result<Vec<Vec<f32>>> {
    if cache.embedder_id() != embedder.id() {
        *cache = EmbeddingCache::new(embedder.id());
    }
    let hashes: Vec<String> = chunks.iter().map(|c| hash_content(&c.text)).collect();
    let mut vectors: Vec<Option<Vec<f32>>> = hashes.iter().map(|h| cache.get(h).cloned()).collect();

    // Misses, deduplicated by content so repeated boilerplate is embedded once.
    let mut seen = HashSet::new();
    let misses: Vec<usize> = (0..chunks.len())
        .filter(|&i| vectors[i].is_none() && seen.insert(hashes[i].as_str()))
        .collect();
    debug!(chunks = chunks.len(), misses = misses.len(), "embedding cache lookup");

    if !misses.is_empty() {
        let pb = ProgressBar::new(misses.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")?
                .progress_chars("#>-"),
        );
        for batch in misses.chunks(batch_size.max(1)) {
            let texts: Vec<String> = batch.iter().map(|&i| chunks[i].text.clone()).collect();
            let embs = embedder.embed_batch(&texts)?;
            ensure!(embs.len() == texts.len(), "embedder returned {} vectors for {} texts", embs.len(), texts.len());
            for (&i, v) in batch.iter().zip(embs) {
                ensure!(v.len() == embedder.dim(), "dim mismatch: got {} expected {}", v.len(), embedder.dim());
                cache.put(hashes[i].clone(), v);
            }
            pb.inc(batch.len() as u64);
        }
        pb.finish_and_clear();
        info!("Embedded {} new chunk texts with {}", misses.len(), embedder.id());
    }

    for (slot, h) in vectors.iter_mut().zip(&hashes) {
        if slot.is_none() {
            *slot = cache.get(h).cloned();
        }
    }
    let live: HashSet<&str> = hashes.iter().map(String::as_str).collect();
    cache.retain_only(&live);
    vectors
        .into_iter()
        .map(|v| v.ok_or_else(|| anyhow!("missing embedding after cache fill")))
        .collect()
}

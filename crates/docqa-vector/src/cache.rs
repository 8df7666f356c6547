//! In-memory embedding cache keyed by `(blake3(text), embedder_id)`.
//!
//! Consulted before the embedder is called and written through on misses, so
//! re-ingesting a mostly unchanged corpus only embeds the changed chunks.

use std::collections::{HashMap, HashSet};

pub fn hash_content(s: &str) -> String {
    blake3::hash(s.as_bytes()).to_hex().to_string()
}

#[derive(Debug, Default)]
pub struct EmbeddingCache {
    embedder_id: String,
    entries: HashMap<String, Vec<f32>>,
}

impl EmbeddingCache {
    pub fn new(embedder_id: impl Into<String>) -> Self {
        Self { embedder_id: embedder_id.into(), entries: HashMap::new() }
    }

    pub fn embedder_id(&self) -> &str {
        &self.embedder_id
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, content_hash: &str) -> Option<&Vec<f32>> {
        self.entries.get(content_hash)
    }

    pub fn put(&mut self, content_hash: String, vector: Vec<f32>) {
        self.entries.insert(content_hash, vector);
    }

    /// Drop every entry whose hash is not in `live`.
    pub fn retain_only(&mut self, live: &HashSet<&str>) {
        self.entries.retain(|h, _| live.contains(h.as_str()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_are_stable_and_content_addressed() {
        assert_eq!(hash_content("abc"), hash_content("abc"));
        assert_ne!(hash_content("abc"), hash_content("abd"));
        assert_eq!(hash_content("abc").len(), 64);
    }

    #[test]
    fn retain_only_evicts_dead_entries() {
        let mut cache = EmbeddingCache::new("hash:d2");
        cache.put("a".into(), vec![1.0, 0.0]);
        cache.put("b".into(), vec![0.0, 1.0]);
        cache.retain_only(&HashSet::from(["b"]));
        assert_eq!(cache.len(), 1);
        assert!(cache.get("a").is_none());
        assert_eq!(cache.embedder_id(), "hash:d2");
    }
}

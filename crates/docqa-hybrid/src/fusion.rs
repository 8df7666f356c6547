//! Weighted Reciprocal Rank Fusion.
//!
//! `score(c) = alpha / (k_rrf + rank_vector(c)) + (1 - alpha) / (k_rrf + rank_keyword(c))`
//!
//! Ranks are 1-based positions in each list's native order, and a list a chunk
//! is missing from contributes nothing. Only ranks enter the formula, so
//! distances and BM25 scores never need to be put on a common scale.

use std::cmp::Ordering;
use std::collections::HashMap;

use docqa_core::config::SearchConfig;
use docqa_core::error::{Error, Result};
use docqa_core::types::{ChunkKey, RankedChunk, SourceKind};

/// Rank-damping constant from Cormack, Clarke and Buettcher (SIGIR 2009).
pub const RRF_K: u32 = 60;
pub const DEFAULT_ALPHA: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionConfig {
    alpha: f64,
    k_rrf: u32,
}

impl FusionConfig {
    pub fn new(alpha: f64, k_rrf: u32) -> Result<Self> {
        if !(0.0..=1.0).contains(&alpha) {
            return Err(Error::InvalidConfig(format!("alpha must be within [0, 1], got {alpha}")));
        }
        if k_rrf == 0 {
            return Err(Error::InvalidConfig("k_rrf must be positive".into()));
        }
        Ok(Self { alpha, k_rrf })
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn k_rrf(&self) -> u32 {
        self.k_rrf
    }

    fn term(&self, weight: f64, rank: Option<usize>) -> f64 {
        rank.map_or(0.0, |r| weight / (f64::from(self.k_rrf) + r as f64))
    }
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self { alpha: DEFAULT_ALPHA, k_rrf: RRF_K }
    }
}

impl TryFrom<&SearchConfig> for FusionConfig {
    type Error = Error;

    fn try_from(search: &SearchConfig) -> Result<Self> {
        Self::new(search.alpha, search.k_rrf)
    }
}

struct Candidate {
    hit: RankedChunk,
    vector_rank: Option<usize>,
    keyword_rank: Option<usize>,
    first_seen: usize,
    score: f64,
}

/// Absent ranks sort after every present rank.
fn cmp_rank(a: Option<usize>, b: Option<usize>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Fuse a vector list (best first) and a keyword list (best first) into at
/// most `top_k` chunks ordered by descending `hybrid_score`.
///
/// Chunks are identified by [`ChunkKey`]; a key repeated within one list only
/// counts at its first rank. The vector copy of a chunk is kept when both
/// lists hold it, and its `kind` becomes [`SourceKind::Hybrid`]. Equal scores
/// are ordered by vector rank, then keyword rank, then first appearance
/// scanning the vector list before the keyword list.
pub fn reciprocal_rank_fusion(
    vector: &[RankedChunk],
    keyword: &[RankedChunk],
    top_k: usize,
    config: &FusionConfig,
) -> Vec<RankedChunk> {
    if top_k == 0 {
        return vec![];
    }
    let mut by_key: HashMap<ChunkKey, Candidate> = HashMap::with_capacity(vector.len() + keyword.len());
    let mut seen = 0usize;
    for (list, hits) in [(SourceKind::Vector, vector), (SourceKind::Keyword, keyword)] {
        for (i, hit) in hits.iter().enumerate() {
            let rank = i + 1;
            let cand = by_key.entry(hit.key()).or_insert_with(|| {
                seen += 1;
                Candidate { hit: hit.clone(), vector_rank: None, keyword_rank: None, first_seen: seen, score: 0.0 }
            });
            let slot = if list == SourceKind::Vector { &mut cand.vector_rank } else { &mut cand.keyword_rank };
            if slot.is_none() {
                *slot = Some(rank);
            }
        }
    }

    let mut fused: Vec<Candidate> = by_key
        .into_values()
        .map(|mut c| {
            c.score = config.term(config.alpha, c.vector_rank) + config.term(1.0 - config.alpha, c.keyword_rank);
            c
        })
        .collect();
    fused.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| cmp_rank(a.vector_rank, b.vector_rank))
            .then_with(|| cmp_rank(a.keyword_rank, b.keyword_rank))
            .then_with(|| a.first_seen.cmp(&b.first_seen))
    });
    fused.truncate(top_k);

    fused
        .into_iter()
        .map(|c| {
            let mut hit = c.hit;
            if c.vector_rank.is_some() && c.keyword_rank.is_some() {
                hit.kind = SourceKind::Hybrid;
            }
            hit.hybrid_score = Some(c.score);
            hit
        })
        .collect()
}

//! Domain types shared by the chunker, both retrieval adapters and the fusion engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An extracted document handed over by a loader.
///
/// `content` may embed `--- Page N ---` markers (see [`crate::page`]); they are
/// the only way the chunker recovers page provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    pub source: String,
}

impl Document {
    pub fn new(content: impl Into<String>, source: impl Into<String>) -> Self {
        Self { content: content.into(), source: source.into() }
    }
}

/// A contiguous span of a document's extracted text.
///
/// - `text`: trimmed span text
/// - `source`: originating document identifier (file name)
/// - `page`: page resolved from the nearest page marker, 0 when unknown
/// - `chunk_id`: position within the document's chunk sequence, starting at 0
///
/// `chunk_id` is only unique per `source`; use [`Chunk::key`] across documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub source: String,
    pub page: u32,
    pub chunk_id: u32,
}

impl Chunk {
    pub fn key(&self) -> ChunkKey {
        ChunkKey { source: self.source.clone(), page: self.page, chunk_id: self.chunk_id }
    }
}

/// Composite identity `(source, page, chunk_id)`, the only identity that is
/// stable across independently produced ranked lists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkKey {
    pub source: String,
    pub page: u32,
    pub chunk_id: u32,
}

impl fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.source, self.page, self.chunk_id)
    }
}

/// Indicates which retrieval path produced a result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Vector,
    Keyword,
    Hybrid,
}

/// A chunk as returned by one retrieval query.
///
/// `score` keeps the producing engine's native scale: squared L2 distance for
/// vector hits (lower is better), BM25 relevance for keyword hits (higher is
/// better). `hybrid_score` is only set by the fusion engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedChunk {
    pub chunk: Chunk,
    pub score: f32,
    pub kind: SourceKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hybrid_score: Option<f64>,
}

impl RankedChunk {
    pub fn new(chunk: Chunk, score: f32, kind: SourceKind) -> Self {
        Self { chunk, score, kind, hybrid_score: None }
    }

    pub fn key(&self) -> ChunkKey {
        self.chunk.key()
    }
}

/// Retrieval strategy used to answer a query.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SearchMethod {
    Vector,
    #[default]
    Hybrid,
}

impl fmt::Display for SearchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchMethod::Vector => f.write_str("vector"),
            SearchMethod::Hybrid => f.write_str("hybrid"),
        }
    }
}

impl std::str::FromStr for SearchMethod {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "vector" => Ok(SearchMethod::Vector),
            "hybrid" => Ok(SearchMethod::Hybrid),
            other => Err(crate::error::Error::InvalidConfig(format!(
                "unknown search method '{other}' (expected 'vector' or 'hybrid')"
            ))),
        }
    }
}

/// A cited `(document, page)` pair in a query response.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRef {
    pub document: String,
    pub page: u32,
}

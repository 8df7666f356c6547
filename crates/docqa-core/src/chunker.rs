//! Overlapping, page-tagged text windows.
//!
//! Windows are measured in characters. A window that stops short of the end
//! of the text is pulled back to just after its last `.` when that period sits
//! past the window's midpoint, so chunks tend to end on sentence boundaries
//! without collapsing into tiny fragments.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::page::PageMarkers;
use crate::types::{Chunk, Document};

/// What to do with a chunk no page marker resolves for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageMarkerPolicy {
    /// Record page 0.
    #[default]
    Lenient,
    /// Fail ingestion with [`Error::MissingPageMarker`].
    Strict,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub page_markers: PageMarkerPolicy,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { chunk_size: 1000, chunk_overlap: 200, page_markers: PageMarkerPolicy::Lenient }
    }
}

impl ChunkingConfig {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self { chunk_size, chunk_overlap, ..Self::default() }
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk_size must be positive".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(Error::InvalidConfig(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Half-open character range `[start, end)` of one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Window {
    start: usize,
    end: usize,
}

#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    /// Split one document. `chunk_id`s run `0..n` for this `source`.
    pub fn chunk(&self, text: &str, source: &str) -> Result<Vec<Chunk>> {
        // Byte offset of every char boundary, plus the end of the text.
        let bounds: Vec<usize> = text
            .char_indices()
            .map(|(b, _)| b)
            .chain(std::iter::once(text.len()))
            .collect();
        let markers = PageMarkers::scan(text);
        let windows = self.windows(text, &bounds);

        let mut chunks = Vec::with_capacity(windows.len());
        for (seq, w) in windows.into_iter().enumerate() {
            let page = match (markers.resolve(w.start, w.end), self.config.page_markers) {
                (Some(page), _) => page,
                (None, PageMarkerPolicy::Lenient) => 0,
                (None, PageMarkerPolicy::Strict) => {
                    return Err(Error::MissingPageMarker { document: source.to_string() })
                }
            };
            let chunk_id = u32::try_from(seq)
                .map_err(|_| Error::Operation(format!("'{source}' produced more than u32::MAX chunks")))?;
            chunks.push(Chunk {
                text: text[bounds[w.start]..bounds[w.end]].trim().to_string(),
                source: source.to_string(),
                page,
                chunk_id,
            });
        }
        debug!(source, chunks = chunks.len(), markers = markers.len(), "chunked document");
        Ok(chunks)
    }

    /// Chunk every document independently and concatenate the results.
    pub fn chunk_documents(&self, documents: &[Document]) -> Result<Vec<Chunk>> {
        let mut all_chunks = Vec::new();
        for doc in documents {
            let chunks = self.chunk(&doc.content, &doc.source)?;
            info!("Chunked {}: {} chunks", doc.source, chunks.len());
            all_chunks.extend(chunks);
        }
        Ok(all_chunks)
    }

    fn windows(&self, text: &str, bounds: &[usize]) -> Vec<Window> {
        let size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;
        let total = bounds.len() - 1;
        let mut windows = Vec::new();
        let mut start = 0usize;
        while start < total {
            let mut end = (start + size).min(total);
            if end < total {
                let window = &text[bounds[start]..bounds[end]];
                if let Some(dot) = window.rfind('.') {
                    let dot_offset = window[..dot].chars().count();
                    if dot_offset > size / 2 {
                        end = start + dot_offset + 1;
                    }
                }
            }
            windows.push(Window { start, end });
            if end >= total {
                break;
            }
            let next = end - overlap.min(end);
            // A snapped window shorter than the overlap would walk backwards.
            start = if next > start { next } else { end };
        }
        windows
    }
}

/// Chunk `text` with an ad-hoc configuration.
pub fn chunk(text: &str, source: &str, size: usize, overlap: usize) -> Result<Vec<Chunk>> {
    Chunker::new(ChunkingConfig::new(size, overlap))?.chunk(text, source)
}

/// Chunk every document with an ad-hoc configuration.
pub fn chunk_documents(documents: &[Document], size: usize, overlap: usize) -> Result<Vec<Chunk>> {
    Chunker::new(ChunkingConfig::new(size, overlap))?.chunk_documents(documents)
}

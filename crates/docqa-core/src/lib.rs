#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]
//! docqa-core
//!
//! Shared vocabulary of the document-QA retrieval stack: chunk types, the
//! `Retriever` / `Embedder` seams, the page-aware chunker, the plain-text
//! loader and configuration.

pub mod chunker;
pub mod config;
pub mod error;
pub mod loader;
pub mod page;
pub mod traits;
pub mod types;

pub use chunker::{Chunker, ChunkingConfig, PageMarkerPolicy};
pub use error::{Error, Result};
pub use types::{Chunk, ChunkKey, Document, RankedChunk, SearchMethod, SourceKind, SourceRef};

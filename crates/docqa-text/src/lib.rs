//! docqa-text
//!
//! Tantivy-backed keyword retrieval over chunks. [`KeywordIndex`] implements
//! the shared `Retriever` seam so the fusion engine can rank against it.

pub mod index;
pub mod tantivy_utils;

pub use index::{IndexLocation, KeywordIndex};

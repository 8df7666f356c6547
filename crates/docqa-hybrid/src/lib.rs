//! docqa-hybrid
//!
//! Rank fusion of vector and keyword retrieval, and the pipeline that ingests
//! documents and answers questions over them.

pub mod engine;
pub mod fusion;
pub mod pipeline;

pub use engine::HybridSearchEngine;
pub use fusion::{reciprocal_rank_fusion, FusionConfig, RRF_K};
pub use pipeline::{
    build_context, build_prompt, unique_sources, AnswerGenerator, ContextAnswerer, IngestReport, Pipeline,
    PipelineConfig, QueryResponse,
};
